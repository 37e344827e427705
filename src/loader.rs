//! Graph loaders: turn an external source into a seeded [`NodeStore`] with
//! every link set symmetrically and the chosen root's `tree_id` biased so
//! it wins election.

use crate::error::LoaderError;
use crate::node_state::NodeStore;
use crate::path_record::{NodeId, TreeId};
use flate2::read::GzDecoder;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Common contract every graph source implements: produce a populated
/// store, optionally biasing one node's `tree_id` so it wins root election.
pub trait GraphLoader {
    fn load(&self, root_id: Option<u64>) -> Result<NodeStore, LoaderError>;
}

fn ensure_node(store: &mut NodeStore, seen: &mut BTreeSet<u64>, id: u64, root_id: Option<u64>) {
    if seen.insert(id) {
        let tree_id = if Some(id) == root_id {
            TreeId::from_node(NodeId::new(id)).biased()
        } else {
            TreeId::from_node(NodeId::new(id))
        };
        store.insert(NodeId::new(id), tree_id);
    }
}

fn link(store: &mut NodeStore, a: u64, b: u64, path: &str) -> Result<(), LoaderError> {
    store
        .link(NodeId::new(a), NodeId::new(b))
        .map_err(|_| LoaderError::MalformedLine {
            path: path.to_string(),
            line_no: 0,
            content: format!("{a} {b}"),
        })
}

/// CAIDA AS-relationship format: `ASx|ASy|z` lines, `#`-comments, only the
/// first two fields used, relationship type ignored.
pub struct AsRelationLoader {
    pub path: String,
}

impl GraphLoader for AsRelationLoader {
    fn load(&self, root_id: Option<u64>) -> Result<NodeStore, LoaderError> {
        let file = File::open(&self.path).map_err(|e| LoaderError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        let mut store = NodeStore::new();
        let mut seen = BTreeSet::new();

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| LoaderError::Io {
                path: self.path.clone(),
                source: e,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = trimmed.split('|').collect();
            if fields.len() < 2 {
                return Err(LoaderError::MalformedLine {
                    path: self.path.clone(),
                    line_no,
                    content: line,
                });
            }
            let parse = |s: &str| {
                s.trim().parse::<u64>().map_err(|_| LoaderError::MalformedLine {
                    path: self.path.clone(),
                    line_no,
                    content: line.clone(),
                })
            };
            let a = parse(fields[0])?;
            let b = parse(fields[1])?;

            ensure_node(&mut store, &mut seen, a, root_id);
            ensure_node(&mut store, &mut seen, b, root_id);
            link(&mut store, a, b, &self.path)?;
        }

        if let Some(root) = root_id {
            if !seen.contains(&root) {
                return Err(LoaderError::UnknownRoot(root));
            }
        }

        Ok(store)
    }
}

/// DIMES edge format: gzip-compressed CSV `node1,node2,...`; ids are
/// `N<digits>` (or `R<digits>` for the designated root, which carries the
/// same numeric id); rows containing `?` are skipped.
pub struct DimesLoader {
    pub path: String,
}

fn parse_dimes_id(field: &str, path: &str, line_no: usize, line: &str) -> Result<u64, LoaderError> {
    let trimmed = field.trim();
    let digits = trimmed
        .strip_prefix('N')
        .or_else(|| trimmed.strip_prefix('R'))
        .unwrap_or(trimmed);
    digits.parse::<u64>().map_err(|_| LoaderError::MalformedLine {
        path: path.to_string(),
        line_no,
        content: line.to_string(),
    })
}

impl GraphLoader for DimesLoader {
    fn load(&self, root_id: Option<u64>) -> Result<NodeStore, LoaderError> {
        let file = File::open(&self.path).map_err(|e| LoaderError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        let decoder = GzDecoder::new(file);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(decoder);

        let mut store = NodeStore::new();
        let mut seen = BTreeSet::new();

        for (line_no, record) in reader.records().enumerate() {
            let record = record.map_err(|e| LoaderError::Csv {
                path: self.path.clone(),
                source: e,
            })?;
            if record.iter().any(|field| field.contains('?')) {
                continue;
            }
            if record.len() < 2 {
                return Err(LoaderError::MalformedLine {
                    path: self.path.clone(),
                    line_no,
                    content: record.iter().collect::<Vec<_>>().join(","),
                });
            }
            let line: String = record.iter().collect::<Vec<_>>().join(",");
            let a = parse_dimes_id(&record[0], &self.path, line_no, &line)?;
            let b = parse_dimes_id(&record[1], &self.path, line_no, &line)?;
            if a == b {
                continue;
            }

            ensure_node(&mut store, &mut seen, a, root_id);
            ensure_node(&mut store, &mut seen, b, root_id);
            link(&mut store, a, b, &self.path)?;
        }

        if let Some(root) = root_id {
            if !seen.contains(&root) {
                return Err(LoaderError::UnknownRoot(root));
            }
        }

        Ok(store)
    }
}

/// Generic whitespace-separated integer-pair edge list, `#`-comments.
pub struct EdgeListLoader {
    pub path: String,
}

impl GraphLoader for EdgeListLoader {
    fn load(&self, root_id: Option<u64>) -> Result<NodeStore, LoaderError> {
        let file = File::open(&self.path).map_err(|e| LoaderError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        let mut store = NodeStore::new();
        let mut seen = BTreeSet::new();

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| LoaderError::Io {
                path: self.path.clone(),
                source: e,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() < 2 {
                return Err(LoaderError::MalformedLine {
                    path: self.path.clone(),
                    line_no,
                    content: line,
                });
            }
            let parse = |s: &str| {
                s.parse::<u64>().map_err(|_| LoaderError::MalformedLine {
                    path: self.path.clone(),
                    line_no,
                    content: line.clone(),
                })
            };
            let a = parse(fields[0])?;
            let b = parse(fields[1])?;

            ensure_node(&mut store, &mut seen, a, root_id);
            ensure_node(&mut store, &mut seen, b, root_id);
            link(&mut store, a, b, &self.path)?;
        }

        if let Some(root) = root_id {
            if !seen.contains(&root) {
                return Err(LoaderError::UnknownRoot(root));
            }
        }

        Ok(store)
    }
}

/// Synthetic `side x side` grid with 4-neighbor connectivity, for smoke
/// testing without a real dataset on hand. Ids may be shuffled so the
/// assignment of coordinates to node ids isn't predictable.
pub struct SquareGridLoader {
    pub side: usize,
    pub randomize: bool,
    pub rng: std::cell::RefCell<StdRng>,
}

impl GraphLoader for SquareGridLoader {
    fn load(&self, root_id: Option<u64>) -> Result<NodeStore, LoaderError> {
        if self.side == 0 {
            return Err(LoaderError::InvalidGridSide(self.side));
        }
        let n = self.side * self.side;
        let mut node_ids: Vec<u64> = (0..n as u64).collect();
        if self.randomize {
            node_ids.shuffle(&mut *self.rng.borrow_mut());
        }

        let mut store = NodeStore::new();
        for &id in &node_ids {
            let tree_id = if Some(id) == root_id {
                TreeId::from_node(NodeId::new(id)).biased()
            } else {
                TreeId::from_node(NodeId::new(id))
            };
            store.insert(NodeId::new(id), tree_id);
        }

        for index in 0..node_ids.len() {
            if index % self.side != 0 {
                store
                    .link(NodeId::new(node_ids[index]), NodeId::new(node_ids[index - 1]))
                    .expect("both ids were just inserted");
            }
            if index >= self.side {
                store
                    .link(
                        NodeId::new(node_ids[index]),
                        NodeId::new(node_ids[index - self.side]),
                    )
                    .expect("both ids were just inserted");
            }
        }

        if let Some(root) = root_id {
            if !node_ids.contains(&root) {
                return Err(LoaderError::UnknownRoot(root));
            }
        }

        Ok(store)
    }
}

pub fn path_extension(path: &str) -> Option<&str> {
    Path::new(path).extension().and_then(|e| e.to_str())
}
