//! Reader and writer for OctoMap octree files.
//!
//! Two encodings are understood, both for the `OcTree` node type:
//!
//! - `.bt` compact binary: every inner node is two bytes holding 2 bits per
//!   child (`00` absent, `01` free leaf, `10` occupied leaf, `11` inner node,
//!   low bit first), followed by its inner children in child order.
//! - `.ot` full: every node is a little-endian `f32` log-odds value and one
//!   byte with a bit per existing child, followed by those children.
//!
//! Keys follow OctoMap's 16-level addressing: a finest voxel key `k` maps to
//! the coordinate `(k - 32768 + 0.5) * resolution`, and child index bits are
//! x (bit 0), y (bit 1), z (bit 2).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use glam::{UVec3, Vec3};

use crate::types::GridError;

pub const TREE_DEPTH: u32 = 16;
pub const TREE_MAX_VAL: u32 = 1 << (TREE_DEPTH - 1);

const BINARY_FILE_HEADER: &str = "# Octomap OcTree binary file";
const FULL_FILE_HEADER: &str = "# Octomap OcTree file";
const TREE_ID: &str = "OcTree";

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf { occupied: bool },
    Inner(Box<[Option<Node>; 8]>),
}

impl Node {
    fn empty_inner() -> Self {
        Node::Inner(Box::default())
    }
}

/// A leaf of the octree: a cube of `span`^3 finest voxels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcTreeLeaf {
    /// Smallest finest-level key covered by the leaf.
    pub key: UVec3,
    pub depth: u32,
    pub occupied: bool,
}

impl OcTreeLeaf {
    /// Number of finest voxels along each axis.
    #[inline]
    pub fn span(&self) -> u32 {
        1 << (TREE_DEPTH - self.depth)
    }

    /// Edge length in meters.
    pub fn size(&self, resolution: f64) -> f32 {
        (self.span() as f64 * resolution) as f32
    }

    /// Center in world coordinates.
    pub fn center(&self, resolution: f64) -> Vec3 {
        let half = self.span() as f64 * 0.5;
        let axis = |k: u32| ((k as f64 - TREE_MAX_VAL as f64 + half) * resolution) as f32;
        Vec3::new(axis(self.key.x), axis(self.key.y), axis(self.key.z))
    }
}

/// Center of the finest voxel with key `key`.
pub fn key_to_coord(key: UVec3, resolution: f64) -> Vec3 {
    let axis = |k: u32| ((k as f64 - TREE_MAX_VAL as f64 + 0.5) * resolution) as f32;
    Vec3::new(axis(key.x), axis(key.y), axis(key.z))
}

/// Key of the finest voxel containing `coord`, `None` outside the addressable range.
pub fn coord_to_key(coord: Vec3, resolution: f64) -> Option<UVec3> {
    let axis = |c: f32| {
        let k = (c as f64 / resolution).floor() + TREE_MAX_VAL as f64;
        (k >= 0.0 && k < (2 * TREE_MAX_VAL) as f64).then_some(k as u32)
    };
    Some(UVec3::new(axis(coord.x)?, axis(coord.y)?, axis(coord.z)?))
}

/// In-memory occupancy octree, read-only after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct OcTree {
    resolution: f64,
    root: Option<Node>,
}

impl OcTree {
    /// Empty tree.
    pub fn new(resolution: f64) -> Result<Self, GridError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::InvalidOctree(format!(
                "resolution must be positive, got {resolution}"
            )));
        }
        Ok(Self {
            resolution,
            root: None,
        })
    }

    /// Unpruned tree holding one finest-level leaf per voxel center.
    /// A voxel listed twice keeps the last state.
    pub fn from_voxels(resolution: f64, voxels: &[(Vec3, bool)]) -> Result<Self, GridError> {
        let mut tree = Self::new(resolution)?;
        for &(center, occupied) in voxels {
            let key = coord_to_key(center, resolution).ok_or_else(|| {
                GridError::InvalidOctree(format!("voxel {center} outside the addressable range"))
            })?;
            let root = tree.root.get_or_insert_with(Node::empty_inner);
            insert(root, key, 0, occupied);
        }
        Ok(tree)
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn num_nodes(&self) -> usize {
        fn count(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Inner(children) => 1 + children.iter().flatten().map(count).sum::<usize>(),
            }
        }
        self.root.as_ref().map_or(0, count)
    }

    /// All leaves in depth-first child order.
    pub fn leaves(&self) -> Vec<OcTreeLeaf> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            collect_leaves(root, UVec3::ZERO, 0, &mut out);
        }
        out
    }

    /// Write the tree in the compact `.bt` encoding.
    pub fn write_binary<W: Write>(&self, writer: &mut W) -> Result<(), GridError> {
        writeln!(writer, "{BINARY_FILE_HEADER}")?;
        writeln!(
            writer,
            "# (feel free to add / change comments, but leave the first line as it is!)"
        )?;
        writeln!(writer, "id {TREE_ID}")?;
        writeln!(writer, "size {}", self.num_nodes())?;
        writeln!(writer, "res {}", self.resolution)?;
        writeln!(writer, "data")?;
        match &self.root {
            Some(Node::Inner(children)) => write_binary_node(children, writer)?,
            Some(Node::Leaf { .. }) => {
                return Err(GridError::InvalidOctree(
                    "a leaf root cannot be written in the binary encoding".to_string(),
                ));
            }
            None => {}
        }
        Ok(())
    }

    pub fn save_binary(&self, path: impl AsRef<Path>) -> Result<(), GridError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_binary(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Load an octree, choosing the encoding from the file extension (`bt` or `ot`).
pub fn load_octree(path: impl AsRef<Path>) -> Result<OcTree, GridError> {
    let path = path.as_ref();
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match extension {
        "bt" => read_binary(&mut BufReader::new(File::open(path)?)),
        "ot" => read_full(&mut BufReader::new(File::open(path)?)),
        _ => Err(GridError::InvalidOctree(format!(
            "unsupported map file '{}', expected .bt or .ot",
            path.display()
        ))),
    }
}

/// Read the compact `.bt` encoding.
pub fn read_binary<R: BufRead>(reader: &mut R) -> Result<OcTree, GridError> {
    let header = read_header(reader, BINARY_FILE_HEADER)?;
    let mut tree = OcTree::new(header.resolution)?;
    if header.size > 0 {
        let mut nodes = 1;
        let children = read_binary_node(reader, 0, &mut nodes)?;
        tree.root = Some(Node::Inner(children));
        check_size(header.size, nodes);
    }
    Ok(tree)
}

/// Read the full `.ot` encoding.
pub fn read_full<R: BufRead>(reader: &mut R) -> Result<OcTree, GridError> {
    let header = read_header(reader, FULL_FILE_HEADER)?;
    let mut tree = OcTree::new(header.resolution)?;
    if header.size > 0 {
        let mut nodes = 0;
        tree.root = Some(read_full_node(reader, 0, &mut nodes)?);
        check_size(header.size, nodes);
    }
    Ok(tree)
}

struct Header {
    size: usize,
    resolution: f64,
}

fn read_header<R: BufRead>(reader: &mut R, first_line: &str) -> Result<Header, GridError> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    if !String::from_utf8_lossy(&line).starts_with(first_line) {
        return Err(GridError::InvalidOctree(format!(
            "first line must be '{first_line}'"
        )));
    }

    let mut id = None;
    let mut size = None;
    let mut resolution = None;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Err(GridError::InvalidOctree(
                "header ended before 'data'".to_string(),
            ));
        }
        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let mut tokens = text.split_whitespace();
        let keyword = tokens.next().unwrap_or_default();
        let value = tokens.next();
        match keyword {
            "data" => break,
            "id" => id = value.map(str::to_string),
            "size" => size = value.and_then(|v| v.parse::<usize>().ok()),
            "res" => resolution = value.and_then(|v| v.parse::<f64>().ok()),
            other => log::warn!("ignoring unknown octree header keyword '{other}'"),
        }
    }

    match id.as_deref() {
        Some(TREE_ID) => {}
        Some(other) => {
            return Err(GridError::InvalidOctree(format!(
                "unsupported tree type '{other}', expected '{TREE_ID}'"
            )));
        }
        None => return Err(GridError::InvalidOctree("missing 'id'".to_string())),
    }
    let size = size.ok_or_else(|| GridError::InvalidOctree("missing 'size'".to_string()))?;
    let resolution =
        resolution.ok_or_else(|| GridError::InvalidOctree("missing 'res'".to_string()))?;

    Ok(Header { size, resolution })
}

fn check_size(declared: usize, read: usize) {
    if declared != read {
        log::warn!("octree header declares {declared} nodes but {read} were read");
    }
}

fn read_bytes<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N], GridError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => {
            GridError::InvalidOctree("node stream ended unexpectedly".to_string())
        }
        _ => GridError::Io(e),
    })?;
    Ok(buf)
}

fn read_binary_node<R: Read>(
    reader: &mut R,
    depth: u32,
    nodes: &mut usize,
) -> Result<Box<[Option<Node>; 8]>, GridError> {
    let bytes = read_bytes::<R, 2>(reader)?;
    let mut children: Box<[Option<Node>; 8]> = Box::default();
    let mut inner = [false; 8];

    for (i, child) in children.iter_mut().enumerate() {
        let bits = (bytes[i / 4] >> (2 * (i % 4))) & 0b11;
        match bits {
            0b10 => *child = Some(Node::Leaf { occupied: true }),
            0b01 => *child = Some(Node::Leaf { occupied: false }),
            0b11 => inner[i] = true,
            _ => continue,
        }
        *nodes += 1;
    }

    for (i, child) in children.iter_mut().enumerate() {
        if !inner[i] {
            continue;
        }
        if depth + 1 >= TREE_DEPTH {
            return Err(GridError::InvalidOctree(format!(
                "inner node below the maximum depth of {TREE_DEPTH}"
            )));
        }
        *child = Some(Node::Inner(read_binary_node(reader, depth + 1, nodes)?));
    }

    Ok(children)
}

fn read_full_node<R: Read>(
    reader: &mut R,
    depth: u32,
    nodes: &mut usize,
) -> Result<Node, GridError> {
    let log_odds = f32::from_le_bytes(read_bytes::<R, 4>(reader)?);
    let [child_mask] = read_bytes::<R, 1>(reader)?;
    *nodes += 1;

    if child_mask == 0 {
        return Ok(Node::Leaf {
            occupied: log_odds >= 0.0,
        });
    }
    if depth >= TREE_DEPTH {
        return Err(GridError::InvalidOctree(format!(
            "node below the maximum depth of {TREE_DEPTH}"
        )));
    }

    let mut children: Box<[Option<Node>; 8]> = Box::default();
    for (i, child) in children.iter_mut().enumerate() {
        if child_mask & (1 << i) != 0 {
            *child = Some(read_full_node(reader, depth + 1, nodes)?);
        }
    }
    Ok(Node::Inner(children))
}

fn write_binary_node<W: Write>(
    children: &[Option<Node>; 8],
    writer: &mut W,
) -> Result<(), GridError> {
    let mut bytes = [0u8; 2];
    for (i, child) in children.iter().enumerate() {
        let bits: u8 = match child {
            None => 0b00,
            Some(Node::Leaf { occupied: true }) => 0b10,
            Some(Node::Leaf { occupied: false }) => 0b01,
            Some(Node::Inner(_)) => 0b11,
        };
        bytes[i / 4] |= bits << (2 * (i % 4));
    }
    writer.write_all(&bytes)?;

    for child in children.iter().flatten() {
        if let Node::Inner(grandchildren) = child {
            write_binary_node(grandchildren, writer)?;
        }
    }
    Ok(())
}

#[inline]
fn child_index(key: UVec3, depth: u32) -> usize {
    let bit = TREE_DEPTH - 1 - depth;
    (((key.x >> bit) & 1) | (((key.y >> bit) & 1) << 1) | (((key.z >> bit) & 1) << 2)) as usize
}

fn insert(node: &mut Node, key: UVec3, depth: u32, occupied: bool) {
    let Node::Inner(children) = node else {
        return;
    };
    let pos = child_index(key, depth);
    if depth + 1 == TREE_DEPTH {
        children[pos] = Some(Node::Leaf { occupied });
        return;
    }
    let child = children[pos].get_or_insert_with(Node::empty_inner);
    insert(child, key, depth + 1, occupied);
}

fn collect_leaves(node: &Node, key: UVec3, depth: u32, out: &mut Vec<OcTreeLeaf>) {
    match node {
        Node::Leaf { occupied } => out.push(OcTreeLeaf {
            key,
            depth,
            occupied: *occupied,
        }),
        Node::Inner(children) => {
            let half = 1u32 << (TREE_DEPTH - 1 - depth);
            for (i, child) in children.iter().enumerate() {
                if let Some(child) = child {
                    let offset = UVec3::new(i as u32 & 1, (i as u32 >> 1) & 1, (i as u32 >> 2) & 1);
                    collect_leaves(child, key + offset * half, depth + 1, out);
                }
            }
        }
    }
}
