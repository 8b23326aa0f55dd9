//! An in-memory volume set.
//!
//! Backs RAM-disk style products and the engine test-suite. Directory scans
//! yield entries in name order, so handle enumeration is reproducible.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::{FileAttributes, OpenFlags, Vfs, VfsDir, VfsError, VfsFile, VfsInfo, VfsResult};

#[derive(Debug)]
struct FileNode {
    data: Arc<Mutex<Vec<u8>>>,
    created: i64,
    modified: i64,
    attrs: FileAttributes,
}

#[derive(Debug, Default)]
struct DirNode {
    entries: BTreeMap<String, Node>,
    created: i64,
    modified: i64,
    attrs: FileAttributes,
}

#[derive(Debug)]
enum Node {
    File(FileNode),
    Dir(DirNode),
}

#[derive(Debug)]
struct Volume {
    prefix: String,
    label: String,
    capacity: u64,
    attrs: FileAttributes,
    online: bool,
    root: DirNode,
}

impl Volume {
    fn used_bytes(&self) -> u64 {
        fn walk(dir: &DirNode) -> u64 {
            dir.entries
                .values()
                .map(|n| match n {
                    Node::File(f) => f.data.lock().unwrap().len() as u64,
                    Node::Dir(d) => walk(d),
                })
                .sum()
        }
        walk(&self.root)
    }
}

#[derive(Debug, Default)]
pub struct MemFs {
    volumes: Vec<Volume>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a volume under the given drive prefix (e.g. `"0:"`).
    pub fn add_volume(&mut self, prefix: &str, label: &str, capacity: u64) {
        self.volumes.push(Volume {
            prefix: prefix.to_string(),
            label: label.to_string(),
            capacity,
            attrs: FileAttributes::new().with_writable(true),
            online: true,
            root: DirNode::default(),
        });
    }

    /// Flags a registered volume's attribute bits (removable, flat, …).
    pub fn set_volume_attrs(&mut self, prefix: &str, f: impl FnOnce(FileAttributes) -> FileAttributes) {
        if let Some(v) = self.volumes.iter_mut().find(|v| v.prefix == prefix) {
            v.attrs = f(v.attrs);
        }
    }

    /// Simulates media removal; an offline volume keeps its slot but reports
    /// no size.
    pub fn set_online(&mut self, prefix: &str, online: bool) {
        if let Some(v) = self.volumes.iter_mut().find(|v| v.prefix == prefix) {
            v.online = online;
        }
    }

    /// Test/setup helper: creates or replaces a file with `content`.
    /// Parent directories must already exist.
    pub fn write_file(&mut self, path: &str, content: &[u8]) -> VfsResult<()> {
        let mut f = self.open(path, OpenFlags::write_truncate())?;
        f.write(content)?;
        Ok(())
    }

    /// Test/setup helper: rewrites the attribute bits of an entry.
    pub fn set_attrs(&mut self, path: &str, f: impl FnOnce(FileAttributes) -> FileAttributes) -> VfsResult<()> {
        let node = self.lookup_mut(path)?;
        match node {
            Node::File(file) => file.attrs = f(file.attrs),
            Node::Dir(dir) => dir.attrs = f(dir.attrs),
        }
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> VfsResult<Vec<u8>> {
        match self.lookup(path)? {
            Node::File(f) => Ok(f.data.lock().unwrap().clone()),
            Node::Dir(_) => Err(VfsError::IsADirectory),
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    fn split_path<'p>(&self, path: &'p str) -> VfsResult<(usize, Vec<&'p str>)> {
        let colon = path.find(':').ok_or(VfsError::InvalidArgument)?;
        let prefix = &path[..=colon];
        let vol = self
            .volumes
            .iter()
            .position(|v| v.prefix == prefix)
            .ok_or(VfsError::NoDevice)?;
        let parts: Vec<&str> = path[colon + 1..]
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        Ok((vol, parts))
    }

    fn lookup(&self, path: &str) -> VfsResult<&Node> {
        let (vol, parts) = self.split_path(path)?;
        let mut dir = &self.volumes[vol].root;
        if parts.is_empty() {
            return Err(VfsError::InvalidArgument);
        }
        for (i, part) in parts.iter().enumerate() {
            let node = dir.entries.get(*part).ok_or(VfsError::NotFound)?;
            if i + 1 == parts.len() {
                return Ok(node);
            }
            match node {
                Node::Dir(d) => dir = d,
                Node::File(_) => return Err(VfsError::NotADirectory),
            }
        }
        unreachable!()
    }

    fn lookup_mut(&mut self, path: &str) -> VfsResult<&mut Node> {
        let (vol, parts) = self.split_path(path)?;
        let mut dir = &mut self.volumes[vol].root;
        if parts.is_empty() {
            return Err(VfsError::InvalidArgument);
        }
        for (i, part) in parts.iter().enumerate() {
            let node = dir.entries.get_mut(*part).ok_or(VfsError::NotFound)?;
            if i + 1 == parts.len() {
                return Ok(node);
            }
            match node {
                Node::Dir(d) => dir = d,
                Node::File(_) => return Err(VfsError::NotADirectory),
            }
        }
        unreachable!()
    }

    /// Resolves the containing directory and final component of `path`.
    fn parent_mut<'s, 'p>(&'s mut self, path: &'p str) -> VfsResult<(&'s mut DirNode, &'p str)> {
        let (vol, parts) = self.split_path(path)?;
        let (last, dirs) = parts.split_last().ok_or(VfsError::InvalidArgument)?;
        let mut dir = &mut self.volumes[vol].root;
        for part in dirs {
            match dir.entries.get_mut(*part).ok_or(VfsError::NotFound)? {
                Node::Dir(d) => dir = d,
                Node::File(_) => return Err(VfsError::NotADirectory),
            }
        }
        Ok((dir, last))
    }

    fn dir_node(&mut self, path: &str) -> VfsResult<&DirNode> {
        let (vol, parts) = self.split_path(path)?;
        let mut dir = &self.volumes[vol].root;
        for part in parts {
            match dir.entries.get(part).ok_or(VfsError::NotFound)? {
                Node::Dir(d) => dir = d,
                Node::File(_) => return Err(VfsError::NotADirectory),
            }
        }
        Ok(dir)
    }
}

fn info_for(name: &str, node: &Node) -> VfsInfo {
    match node {
        Node::File(f) => VfsInfo {
            name: name.to_string(),
            size: f.data.lock().unwrap().len() as u64,
            created: f.created,
            modified: f.modified,
            attrs: f.attrs,
        },
        Node::Dir(d) => VfsInfo {
            name: name.to_string(),
            size: 0,
            created: d.created,
            modified: d.modified,
            attrs: d.attrs.with_directory(true),
        },
    }
}

impl Vfs for MemFs {
    fn volume(&self, index: usize) -> Option<String> {
        self.volumes.get(index).map(|v| v.prefix.clone())
    }

    fn stat(&self, path: &str) -> VfsResult<VfsInfo> {
        let (vol, parts) = self.split_path(path)?;
        let v = &self.volumes[vol];
        if parts.is_empty() {
            return Ok(VfsInfo {
                name: v.label.clone(),
                size: v.used_bytes(),
                created: v.root.created,
                modified: v.root.modified,
                attrs: v.attrs.with_directory(true),
            });
        }
        let node = self.lookup(path)?;
        let name = parts.last().unwrap();
        Ok(info_for(name, node))
    }

    fn open(&mut self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn VfsFile>> {
        let volume_writable;
        {
            let (vol, _) = self.split_path(path)?;
            volume_writable = self.volumes[vol].attrs.writable();
        }
        let (dir, name) = self.parent_mut(path)?;
        if !dir.entries.contains_key(name) {
            if !flags.create() {
                return Err(VfsError::NotFound);
            }
            if !volume_writable {
                return Err(VfsError::ReadOnly);
            }
            dir.entries.insert(
                name.to_string(),
                Node::File(FileNode {
                    data: Arc::new(Mutex::new(Vec::new())),
                    created: 0,
                    modified: 0,
                    attrs: FileAttributes::new().with_writable(true),
                }),
            );
        }
        let file = match dir.entries.get_mut(name).unwrap() {
            Node::Dir(_) => return Err(VfsError::IsADirectory),
            Node::File(f) => {
                if flags.write() && !f.attrs.writable() {
                    return Err(VfsError::PermissionDenied);
                }
                if flags.truncate() {
                    f.data.lock().unwrap().clear();
                }
                f
            }
        };
        Ok(Box::new(MemFile {
            data: Arc::clone(&file.data),
            pos: 0,
            writable: flags.write(),
        }))
    }

    fn open_dir(&mut self, path: &str) -> VfsResult<Box<dyn VfsDir>> {
        let dir = self.dir_node(path)?;
        let entries: Vec<VfsInfo> = dir
            .entries
            .iter()
            .map(|(name, node)| info_for(name, node))
            .collect();
        Ok(Box::new(MemDir { entries, next: 0 }))
    }

    fn mkdir(&mut self, path: &str) -> VfsResult<()> {
        let (dir, name) = self.parent_mut(path)?;
        if dir.entries.contains_key(name) {
            return Err(VfsError::AlreadyExists);
        }
        dir.entries.insert(
            name.to_string(),
            Node::Dir(DirNode {
                entries: BTreeMap::new(),
                created: 0,
                modified: 0,
                attrs: FileAttributes::new().with_writable(true),
            }),
        );
        Ok(())
    }

    fn remove(&mut self, path: &str) -> VfsResult<()> {
        let (dir, name) = self.parent_mut(path)?;
        match dir.entries.get(name) {
            None => Err(VfsError::NotFound),
            Some(Node::File(f)) if !f.attrs.writable() => Err(VfsError::ReadOnly),
            Some(Node::Dir(d)) if !d.entries.is_empty() => Err(VfsError::NotEmpty),
            Some(_) => {
                dir.entries.remove(name);
                Ok(())
            }
        }
    }

    fn format(&mut self, volume: &str) -> VfsResult<()> {
        let v = self
            .volumes
            .iter_mut()
            .find(|v| v.prefix == volume)
            .ok_or(VfsError::NoDevice)?;
        if !v.attrs.writable() {
            return Err(VfsError::ReadOnly);
        }
        v.root = DirNode::default();
        Ok(())
    }

    fn fs_size(&self, path: &str) -> VfsResult<u64> {
        let (vol, _) = self.split_path(path)?;
        let v = &self.volumes[vol];
        if !v.online {
            return Err(VfsError::NoDevice);
        }
        Ok(v.capacity)
    }

    fn fs_free(&self, path: &str) -> VfsResult<u64> {
        let (vol, _) = self.split_path(path)?;
        let v = &self.volumes[vol];
        if !v.online {
            return Err(VfsError::NoDevice);
        }
        Ok(v.capacity.saturating_sub(v.used_bytes()))
    }

    fn touch(&mut self, path: &str, info: &VfsInfo) -> VfsResult<()> {
        let node = self.lookup_mut(path)?;
        match node {
            Node::File(f) => {
                f.created = info.created;
                f.modified = info.modified;
                f.attrs = f
                    .attrs
                    .with_hidden(info.attrs.hidden())
                    .with_system(info.attrs.system())
                    .with_writable(info.attrs.writable());
            }
            Node::Dir(d) => {
                d.created = info.created;
                d.modified = info.modified;
                d.attrs = d
                    .attrs
                    .with_hidden(info.attrs.hidden())
                    .with_system(info.attrs.system())
                    .with_writable(info.attrs.writable());
            }
        }
        Ok(())
    }
}

struct MemFile {
    data: Arc<Mutex<Vec<u8>>>,
    pos: u64,
    writable: bool,
}

impl VfsFile for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        let data = self.data.lock().unwrap();
        let pos = self.pos as usize;
        if pos >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - pos);
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        drop(data);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        if !self.writable {
            return Err(VfsError::PermissionDenied);
        }
        let mut data = self.data.lock().unwrap();
        let pos = self.pos as usize;
        if pos + buf.len() > data.len() {
            data.resize(pos + buf.len(), 0);
        }
        data[pos..pos + buf.len()].copy_from_slice(buf);
        drop(data);
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn seek(&mut self, pos: u64) -> VfsResult<()> {
        let mut data = self.data.lock().unwrap();
        if pos as usize > data.len() {
            if !self.writable {
                return Err(VfsError::InvalidArgument);
            }
            data.resize(pos as usize, 0);
        }
        self.pos = pos;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.lock().unwrap().len() as u64
    }

    fn eof(&self) -> bool {
        self.pos >= self.size()
    }

    fn sync(&mut self) -> VfsResult<()> {
        Ok(())
    }
}

struct MemDir {
    entries: Vec<VfsInfo>,
    next: usize,
}

impl VfsDir for MemDir {
    fn next_entry(&mut self) -> VfsResult<Option<VfsInfo>> {
        let entry = self.entries.get(self.next).cloned();
        self.next += 1;
        Ok(entry)
    }
}
