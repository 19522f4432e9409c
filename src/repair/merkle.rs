use sha2::{Digest, Sha256};

/// Node of a Merkle tree; leaves carry key hashes, branches combine their
/// children.
#[derive(Debug, Clone)]
pub struct MerkleNode {
    pub hash: String,
    pub left: Option<Box<MerkleNode>>,
    pub right: Option<Box<MerkleNode>>,
}

impl MerkleNode {
    fn leaf(hash: String) -> Self {
        Self {
            hash,
            left: None,
            right: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// One detected divergence between two trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleDiff {
    /// Position of the divergent node, as an L/R path from the root.
    pub path: String,
    pub reason: String,
}

/// Hash tree over a key set. Keys are sorted lexicographically before
/// hashing, so the root is deterministic in the set regardless of insertion
/// order; an odd level duplicates its last node.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    root: MerkleNode,
    leaf_count: usize,
}

impl MerkleTree {
    pub fn build(mut keys: Vec<String>) -> Self {
        if keys.is_empty() {
            return Self {
                root: MerkleNode::leaf(hash_data("")),
                leaf_count: 0,
            };
        }

        keys.sort();
        let leaf_count = keys.len();
        let leaves: Vec<MerkleNode> = keys
            .into_iter()
            .map(|key| MerkleNode::leaf(hash_data(&key)))
            .collect();

        Self {
            root: build_level(leaves),
            leaf_count,
        }
    }

    pub fn root_hash(&self) -> &str {
        &self.root.hash
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }
}

fn build_level(mut nodes: Vec<MerkleNode>) -> MerkleNode {
    while nodes.len() > 1 {
        let mut next = Vec::with_capacity(nodes.len().div_ceil(2));
        let mut iter = nodes.into_iter();

        while let Some(left) = iter.next() {
            match iter.next() {
                Some(right) => {
                    let combined = hash_data(&format!("{}{}", left.hash, right.hash));
                    next.push(MerkleNode {
                        hash: combined,
                        left: Some(Box::new(left)),
                        right: Some(Box::new(right)),
                    });
                }
                None => {
                    // Odd width: pair the last node with itself.
                    let combined = hash_data(&format!("{}{}", left.hash, left.hash));
                    next.push(MerkleNode {
                        hash: combined,
                        left: Some(Box::new(left)),
                        right: None,
                    });
                }
            }
        }

        nodes = next;
    }

    match nodes.pop() {
        Some(root) => root,
        None => MerkleNode::leaf(hash_data("")),
    }
}

fn hash_data(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Lists where two trees disagree; empty when the roots match.
pub fn compare_trees(first: &MerkleTree, second: &MerkleTree) -> Vec<MerkleDiff> {
    if first.root_hash() == second.root_hash() {
        return Vec::new();
    }

    let mut diffs = Vec::new();
    find_differences(Some(&first.root), Some(&second.root), String::new(), &mut diffs);
    diffs
}

fn find_differences(
    first: Option<&MerkleNode>,
    second: Option<&MerkleNode>,
    path: String,
    diffs: &mut Vec<MerkleDiff>,
) {
    match (first, second) {
        (None, None) => {}
        (None, Some(_)) => diffs.push(MerkleDiff {
            path,
            reason: "node missing in first tree".to_string(),
        }),
        (Some(_), None) => diffs.push(MerkleDiff {
            path,
            reason: "node missing in second tree".to_string(),
        }),
        (Some(a), Some(b)) => {
            if a.hash == b.hash {
                return;
            }

            if a.is_leaf() && b.is_leaf() {
                diffs.push(MerkleDiff {
                    path,
                    reason: "key difference detected".to_string(),
                });
                return;
            }

            find_differences(
                a.left.as_deref(),
                b.left.as_deref(),
                format!("{}L", path),
                diffs,
            );
            find_differences(
                a.right.as_deref(),
                b.right.as_deref(),
                format!("{}R", path),
                diffs,
            );
        }
    }
}
