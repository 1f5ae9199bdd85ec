//! NeXaS-flavored Huffman codec.
//!
//! A prefix-code compressor whose *serialized tree* uses a preorder
//! bitstream format with byte literals at leaves, used by the PAC container
//! to compress its tail index. Builds a node pool with parent/child links
//! from symbol weights and walks leaf-to-root to emit codes; static (built
//! once over the whole input) rather than adaptive, and serialized as an
//! explicit preorder bitstream rather than implied by a fixed canonical
//! ordering.

use crate::bitstream::BitStream;
use crate::error::{Error, Result};
use crate::priority_queue::MinPriorityQueue;

const LEAF_BASE: usize = 256;
const LITERAL_OFFSET: u16 = 1024;

#[derive(Clone, Copy, Default)]
struct EncNode {
    parent: Option<usize>,
    is_right_child: bool,
    children: [usize; 2],
}

struct EncodeTree {
    nodes: Vec<EncNode>,
    root: usize,
}

/// Builds the encode tree over the byte frequencies of `input`.
///
/// Per §4.3.2: bytes with zero frequency are excluded; the queue
/// repeatedly merges the two lowest-weight entries until one remains,
/// which becomes the root. Degenerate inputs (a single distinct byte)
/// leave `root` pointing directly at a leaf slot, with no merges at all.
fn build_encode_tree(input: &[u8]) -> EncodeTree {
    let mut freq = [0u32; 256];
    for &b in input {
        freq[b as usize] += 1;
    }
    let mut nodes = vec![EncNode::default(); 512];
    let mut pq = MinPriorityQueue::new(256);
    for (b, &f) in freq.iter().enumerate() {
        if f > 0 {
            pq.insert(b as u32, f);
        }
    }
    let mut next_slot = LEAF_BASE;
    while pq.len() > 1 {
        let (a, aw) = pq.pop_min().unwrap();
        let (b, bw) = pq.pop_min().unwrap();
        let idx = next_slot;
        next_slot += 1;
        nodes[a as usize].parent = Some(idx);
        nodes[a as usize].is_right_child = false;
        nodes[b as usize].parent = Some(idx);
        nodes[b as usize].is_right_child = true;
        nodes[idx].children = [a as usize, b as usize];
        pq.insert(idx as u32, aw + bw);
    }
    let root = pq.pop_min().map(|(p, _)| p as usize).unwrap_or(0);
    EncodeTree { nodes, root }
}

/// Walks leaf-to-root collecting `is_right_child` bits (the code in
/// reverse), then reverses so the prefix code comes out MSB-first. A
/// degenerate tree where `symbol == root` yields an empty code without
/// underflowing any counter, since the loop below never decrements an
/// unsigned length, it only stops once `node == root`.
fn code_for_symbol(tree: &EncodeTree, symbol: u8) -> Vec<u8> {
    let mut bits = Vec::new();
    let mut node = symbol as usize;
    while node != tree.root {
        let n = &tree.nodes[node];
        bits.push(n.is_right_child as u8);
        node = n.parent.expect("every non-root node has a parent");
    }
    bits.reverse();
    bits
}

fn serialize_tree(node: usize, tree: &EncodeTree, bs: &mut BitStream, cap: usize) -> Result<()> {
    if node < LEAF_BASE {
        bs.set_next_bit(0).ok_or(Error::EncodingOverflow(cap))?;
        bs.set_next_byte(node as u8)
            .ok_or(Error::EncodingOverflow(cap))?;
    } else {
        bs.set_next_bit(1).ok_or(Error::EncodingOverflow(cap))?;
        serialize_tree(tree.nodes[node].children[0], tree, bs, cap)?;
        serialize_tree(tree.nodes[node].children[1], tree, bs, cap)?;
    }
    Ok(())
}

/// Encodes `input`, returning the serialized tree followed by the coded
/// data. `ctx` names the caller (typically the PAC entry or section this
/// blob belongs to) purely for diagnostics.
pub fn huffman_encode(ctx: &str, input: &[u8]) -> Result<Vec<u8>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let tree = build_encode_tree(input);
    let distinct = {
        let mut seen = [false; 256];
        let mut n = 0;
        for &b in input {
            if !seen[b as usize] {
                seen[b as usize] = true;
                n += 1;
            }
        }
        n
    };
    if distinct == 1 {
        log::warn!(
            "{ctx}: huffman input has a single distinct byte; the serialized tree will not survive decoding (degenerate root)"
        );
    }

    let cap = 2 * input.len();
    let mut scratch = vec![0u8; cap];
    {
        let mut bs = BitStream::new(&mut scratch);
        serialize_tree(tree.root, &tree, &mut bs, cap)?;
        for &byte in input {
            for bit in code_for_symbol(&tree, byte) {
                bs.set_next_bit(bit).ok_or(Error::EncodingOverflow(cap))?;
            }
        }
        let end = bs.byte_index() + 1;
        if end > scratch.len() {
            return Err(Error::EncodingOverflow(cap));
        }
        scratch.truncate(end);
    }
    Ok(scratch)
}

/// Deserializes a preorder tree from `bs` into the compact decode
/// representation described in §3: each internal node's two children are
/// either another internal node index (< 256) or `1024 + literal_byte`.
fn deserialize_tree(
    bs: &mut BitStream,
    free_slot: &mut usize,
    nodes: &mut Vec<[u16; 2]>,
    ctx: &str,
) -> Result<u16> {
    let bit = bs
        .next_bit()
        .ok_or_else(|| Error::CorruptInput(format!("{ctx}: huffman tree truncated")))?;
    if bit == 1 {
        if *free_slot >= 256 {
            return Err(Error::CorruptInput(format!(
                "{ctx}: huffman tree exceeds 256 internal nodes"
            )));
        }
        let idx = *free_slot;
        *free_slot += 1;
        nodes.push([0, 0]);
        let left = deserialize_tree(bs, free_slot, nodes, ctx)?;
        let right = deserialize_tree(bs, free_slot, nodes, ctx)?;
        nodes[idx] = [left, right];
        Ok(idx as u16)
    } else {
        let byte = bs
            .next_byte()
            .ok_or_else(|| Error::CorruptInput(format!("{ctx}: huffman tree truncated at leaf")))?;
        Ok(LITERAL_OFFSET + byte as u16)
    }
}

/// Decodes a Huffman-compressed blob produced by [`huffman_encode`].
/// `decoded_len` is the exact number of bytes to produce; trailing unused
/// bits in the final byte are ignored.
pub fn huffman_decode(ctx: &str, encoded: &[u8], decoded_len: usize) -> Result<Vec<u8>> {
    if decoded_len == 0 {
        return Ok(Vec::new());
    }
    let mut scratch = encoded.to_vec();
    let mut bs = BitStream::new(&mut scratch);
    let mut free_slot = 0usize;
    let mut nodes: Vec<[u16; 2]> = Vec::new();
    let root = deserialize_tree(&mut bs, &mut free_slot, &mut nodes, ctx)?;
    if root != 0 {
        return Err(Error::CorruptInput(format!(
            "{ctx}: huffman tree root is not index 0 (degenerate single-symbol tree)"
        )));
    }

    let mut out = Vec::with_capacity(decoded_len);
    let mut node_idx = 0usize;
    while out.len() < decoded_len {
        let bit = bs.next_bit().ok_or_else(|| {
            Error::CorruptInput(format!("{ctx}: huffman stream exhausted before decoded_len"))
        })?;
        let child = nodes[node_idx][bit as usize];
        if child >= LITERAL_OFFSET {
            out.push((child - LITERAL_OFFSET) as u8);
            node_idx = 0;
        } else {
            node_idx = child as usize;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_of_two_round_trips() {
        let mut data = Vec::with_capacity(256);
        for i in 0..256 {
            data.push(if i % 2 == 0 { 0x41 } else { 0x42 });
        }
        let encoded = huffman_encode("test", &data).unwrap();
        // tree bits: 1 (internal root), 0 byte=0x41, 0 byte=0x42
        let mut check = encoded.clone();
        let mut bs = BitStream::new(&mut check);
        assert_eq!(bs.next_bit(), Some(1));
        assert_eq!(bs.next_bit(), Some(0));
        assert_eq!(bs.next_byte(), Some(0x41));
        assert_eq!(bs.next_bit(), Some(0));
        assert_eq!(bs.next_byte(), Some(0x42));

        let decoded = huffman_decode("test", &encoded, data.len()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn multi_symbol_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog. the quick brown fox!".to_vec();
        let encoded = huffman_encode("test", &data).unwrap();
        let decoded = huffman_decode("test", &encoded, data.len()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn single_distinct_byte_is_rejected_on_decode() {
        let data = vec![0x07u8; 40];
        let encoded = huffman_encode("test", &data).unwrap();
        let result = huffman_decode("test", &encoded, data.len());
        assert!(matches!(result, Err(Error::CorruptInput(_))));
    }

    #[test]
    fn empty_input_round_trips_to_empty() {
        let encoded = huffman_encode("test", &[]).unwrap();
        assert!(encoded.is_empty());
        let decoded = huffman_decode("test", &encoded, 0).unwrap();
        assert!(decoded.is_empty());
    }
}
