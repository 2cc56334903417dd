//! Huffman trees used for compressed string fields.
//!
//! A compressed table stores its prefix tree at the start of its huffman
//! buffer. The tree is written level by level: every internal node, starting
//! from an implicit root, is described by two `(index, value)` byte pairs for
//! its left and right child. An index of `0` marks a leaf holding `value`,
//! anything else marks an internal node whose own pairs follow later.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::{Error, Result};

/// Index of the root in [`HuffmanTree::nodes`]
const ROOT: usize = 0;

/// A node of a [`HuffmanTree`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HuffmanNode {
    /// Internal node, children are indices into the tree's node list
    Branch {
        /// Child followed on a `0` bit
        left: usize,
        /// Child followed on a `1` bit
        right: usize,
    },
    /// Terminal node holding one decoded byte
    Leaf(u8),
}

/// A prefix tree read from a huffman buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    nodes: Vec<HuffmanNode>,
    encoded_len: usize,
}

impl HuffmanTree {
    /// Build a tree from the start of `buffer`
    ///
    /// Bytes after the tree description are ignored, see [`HuffmanTree::encoded_len`].
    pub fn parse(buffer: &[u8]) -> Result<HuffmanTree> {
        // The root is never a child, so 0 doubles as "not yet expanded".
        let mut nodes = vec![HuffmanNode::Branch { left: ROOT, right: ROOT }];
        let mut current = VecDeque::from([ROOT]);
        let mut next = VecDeque::new();
        let mut cursor = 0;

        while let Some(parent) = current.pop_front() {
            let pairs = buffer
                .get(cursor..cursor + 4)
                .ok_or(Error::InvalidHuffmanTree { offset: cursor })?;
            cursor += 4;

            let mut children = [ROOT; 2];
            for (child, pair) in children.iter_mut().zip(pairs.chunks_exact(2)) {
                *child = nodes.len();
                nodes.push(match pair[0] {
                    0 => HuffmanNode::Leaf(pair[1]),
                    _ => HuffmanNode::Branch { left: ROOT, right: ROOT },
                });
            }

            let [left, right] = children;
            nodes[parent] = HuffmanNode::Branch { left, right };

            for child in [right, left] {
                if matches!(nodes[child], HuffmanNode::Branch { .. }) {
                    next.push_back(child);
                }
            }

            if current.is_empty() {
                std::mem::swap(&mut current, &mut next);
            }
        }

        trace!(nodes = nodes.len(), encoded_len = cursor, "parsed huffman tree");

        Ok(HuffmanTree {
            nodes,
            encoded_len: cursor,
        })
    }

    /// Number of bytes the tree description occupied
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    /// All nodes, the root first
    pub fn nodes(&self) -> &[HuffmanNode] {
        &self.nodes
    }

    /// Number of leaves in the tree
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, HuffmanNode::Leaf(_)))
            .count()
    }

    /// Lazily decode `input`, see [`Decoder`]
    pub fn decoder<'a>(&'a self, input: &'a [u8]) -> Decoder<'a> {
        Decoder {
            tree: self,
            input,
            byte: 0,
            bit: 0,
            node: ROOT,
            terminated: false,
        }
    }

    /// Decode all of `input`
    pub fn decode(&self, input: &[u8]) -> Decoded {
        let mut decoder = self.decoder(input);
        let bytes = decoder.by_ref().collect();
        Decoded {
            bytes,
            complete: decoder.is_terminated(),
        }
    }
}

/// Output of [`HuffmanTree::decode`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Decoded bytes
    pub bytes: Vec<u8>,
    /// Whether decoding stopped on a terminator rather than running out of input
    pub complete: bool,
}

impl Decoded {
    /// Decoded bytes as text, each byte mapped to the character of the same code point
    pub fn text(&self) -> String {
        self.bytes.iter().map(|&b| char::from(b)).collect()
    }
}

/// Iterator walking a bitstream through a [`HuffmanTree`]
///
/// Bits are consumed most significant first. A `0` bit follows the left child,
/// a `1` bit the right child, and every leaf reached yields its byte and
/// restarts the walk at the root. A zero byte found before any of its bits were
/// used ends the stream.
pub struct Decoder<'a> {
    tree: &'a HuffmanTree,
    input: &'a [u8],
    byte: usize,
    bit: u8,
    node: usize,
    terminated: bool,
}

impl Decoder<'_> {
    /// Whether the stream ended on a terminator
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl Iterator for Decoder<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        loop {
            if self.terminated {
                return None;
            }

            let current = *self.input.get(self.byte)?;
            if self.bit == 0 && current == 0 {
                self.terminated = true;
                return None;
            }

            let set = (current >> (7 - self.bit)) & 1 == 1;
            self.bit += 1;
            if self.bit == 8 {
                self.bit = 0;
                self.byte += 1;
            }

            let HuffmanNode::Branch { left, right } = self.tree.nodes[self.node] else {
                return None;
            };

            let child = if set { right } else { left };
            match self.tree.nodes[child] {
                HuffmanNode::Leaf(value) => {
                    self.node = ROOT;
                    return Some(value);
                }
                HuffmanNode::Branch { .. } => self.node = child,
            }
        }
    }
}
