use std::collections::BTreeMap;

use proptest::prelude::*;
use risusave::block::{encode_block, BlockType};
use risusave::codec::Compression;
use risusave::container::{decode, encode_container, Container, ContainerError};
use risusave::merge::{merge_delta, Delta};
use risusave::MAGIC;
use tempfile::NamedTempFile;

fn sample_container() -> Container {
    let mut c = Container::new();
    c.insert_block(BlockType::Config, Compression::Stored, "config", r#"{"theme":"dark"}"#).unwrap();
    c.insert_block(BlockType::Root, Compression::Gzip, "root", r#"{"characters":["c1","c2"]}"#).unwrap();
    c.insert_block(BlockType::CharacterWithChat, Compression::Gzip, "c1", &"chat ".repeat(500)).unwrap();
    c.insert_block(BlockType::CharacterWithChat, Compression::Gzip, "c2", "{}").unwrap();
    c.insert_block(BlockType::BotPreset, Compression::Gzip, "preset", "[]").unwrap();
    c.insert_block(BlockType::Modules, Compression::Stored, "modules", "[]").unwrap();
    c
}

#[test]
fn test_file_roundtrip_is_byte_identical() {
    let temp_file = NamedTempFile::new().unwrap();
    let original = sample_container().encode();
    std::fs::write(temp_file.path(), &original).unwrap();

    let read_back = std::fs::read(temp_file.path()).unwrap();
    let container = decode(&read_back).unwrap();
    assert_eq!(container.len(), 6);
    assert_eq!(container.encode(), original);
}

#[test]
fn test_root_hello_scenario() {
    let mut data = MAGIC.to_vec();
    data.extend_from_slice(&[1, 0, 4]);
    data.extend_from_slice(b"root");
    data.extend_from_slice(&5u32.to_le_bytes());
    data.extend_from_slice(b"hello");

    let c = decode(&data).unwrap();
    let root = c.get("root").unwrap();
    assert_eq!(root.kind(), Some(BlockType::Root));
    assert_eq!(root.content.as_deref(), Some("hello"));
    assert_eq!(
        encode_container([encode_block(BlockType::Root, Compression::Stored, "root", "hello").unwrap().as_slice()]),
        data
    );
}

#[test]
fn test_second_block_overrun_is_corrupt() {
    let first  = encode_block(BlockType::Root, Compression::Stored, "root", "hello").unwrap();
    let mut second = encode_block(BlockType::Chat, Compression::Stored, "chat", "abc").unwrap();
    // Bump declared length past the end of the buffer.
    let len_at = 3 + "chat".len();
    second[len_at..len_at + 4].copy_from_slice(&50u32.to_le_bytes());

    let data = encode_container([first.as_slice(), second.as_slice()]);
    assert!(matches!(decode(&data), Err(ContainerError::CorruptContainer { .. })));
}

#[test]
fn test_merge_changes_and_deletes() {
    let original = sample_container().encode();
    let new_c1 = encode_block(BlockType::CharacterWithChat, Compression::Gzip, "c1", "edited").unwrap();
    let new_c3 = encode_block(BlockType::CharacterWithChat, Compression::Stored, "c3", "fresh").unwrap();
    let delta = Delta::from_raw(
        [("c1", new_c1.as_slice()), ("c3", new_c3.as_slice())],
        vec!["c2".to_string(), "never-existed".to_string()],
    );

    let merged = decode(&merge_delta(&original, &delta, Compression::Gzip).unwrap()).unwrap();
    assert_eq!(
        merged.names().collect::<Vec<_>>(),
        vec!["config", "root", "c1", "preset", "modules", "c3"]
    );
    assert_eq!(merged.get("c1").unwrap().content.as_deref(), Some("edited"));
    assert_eq!(merged.get("c3").unwrap().content.as_deref(), Some("fresh"));

    let before = decode(&original).unwrap();
    for name in ["config", "root", "preset", "modules"] {
        assert_eq!(merged.get(name).unwrap().raw, before.get(name).unwrap().raw);
    }
}

#[test]
fn test_merge_empty_delta_preserves_content() {
    let original = sample_container().encode();
    let merged = merge_delta(&original, &Delta::default(), Compression::Stored).unwrap();
    let a = decode(&original).unwrap();
    let b = decode(&merged).unwrap();
    for block in a.iter() {
        assert_eq!(b.get(&block.name).unwrap().content, block.content);
    }
    assert_eq!(a.len(), b.len());
}

fn block_type_strategy() -> impl Strategy<Value = BlockType> {
    prop_oneof![
        Just(BlockType::Config),
        Just(BlockType::Root),
        Just(BlockType::CharacterWithChat),
        Just(BlockType::Chat),
        Just(BlockType::BotPreset),
        Just(BlockType::Modules),
    ]
}

proptest! {
    #[test]
    fn prop_decode_encode_roundtrip(
        blocks in prop::collection::btree_map(
            "[a-z0-9_-]{1,40}",
            (block_type_strategy(), any::<bool>(), ".{0,200}"),
            0..8,
        )
    ) {
        let mut c = Container::new();
        for (name, (kind, gz, content)) in &blocks {
            c.insert_block(*kind, Compression::from(*gz), name, content).unwrap();
        }
        let encoded = c.encode();
        let decoded = decode(&encoded).unwrap();

        prop_assert_eq!(decoded.len(), blocks.len());
        for (name, (kind, gz, content)) in &blocks {
            let b = decoded.get(name).unwrap();
            prop_assert_eq!(b.kind(), Some(*kind));
            prop_assert_eq!(b.compression, Compression::from(*gz));
            prop_assert_eq!(b.content.as_deref(), Some(content.as_str()));
        }
        prop_assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn prop_merge_matches_expected_names(
        names in prop::collection::btree_set("[a-z]{1,6}", 1..10),
        deleted_mask in prop::collection::vec(any::<bool>(), 10),
    ) {
        let mut c = Container::new();
        for name in &names {
            c.insert_block(BlockType::Chat, Compression::Stored, name, name).unwrap();
        }
        let deleted: Vec<String> = names
            .iter()
            .zip(&deleted_mask)
            .filter(|(_, d)| **d)
            .map(|(n, _)| n.clone())
            .collect();
        let delta = Delta { blocks: BTreeMap::new(), deleted: deleted.clone() };

        let merged = decode(&merge_delta(&c.encode(), &delta, Compression::Stored).unwrap()).unwrap();
        let expected: Vec<&String> = names.iter().filter(|n| !deleted.contains(*n)).collect();
        prop_assert_eq!(merged.names().collect::<Vec<_>>(), expected.iter().map(|s| s.as_str()).collect::<Vec<_>>());
    }
}
