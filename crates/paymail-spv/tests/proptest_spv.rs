use proptest::prelude::*;

use paymail_primitives::chainhash::Hash;
use paymail_spv::{merkle_tree_parent, pair_offset, Bump, BumpLeaf, DecodedBeef};

const BRC62_HEX: &str = "0100beef01fe636d0c0007021400fe507c0c7aa754cef1f7889d5fd395cf1f785dd7de98eed895dbedfe4e5bc70d1502ac4e164f5bc16746bb0868404292ac8318bbac3800e4aad13a014da427adce3e010b00bc4ff395efd11719b277694cface5aa50d085a0bb81f613f70313acd28cf4557010400574b2d9142b8d28b61d88e3b2c3f44d858411356b49a28a4643b6d1a6a092a5201030051a05fc84d531b5d250c23f4f886f6812f9fe3f402d61607f977b4ecd2701c19010000fd781529d58fc2523cf396a7f25440b409857e7e221766c57214b1d38c7b481f01010062f542f45ea3660f86c013ced80534cb5fd4c19d66c56e7e8c5d4bf2d40acc5e010100b121e91836fd7cd5102b654e9f72f3cf6fdbfd0b161c53a9c54b12c841126331020100000001cd4e4cac3c7b56920d1e7655e7e260d31f29d9a388d04910f1bbd72304a79029010000006b483045022100e75279a205a547c445719420aa3138bf14743e3f42618e5f86a19bde14bb95f7022064777d34776b05d816daf1699493fcdf2ef5a5ab1ad710d9c97bfb5b8f7cef3641210263e2dee22b1ddc5e11f6fab8bcd2378bdd19580d640501ea956ec0e786f93e76ffffffff013e660000000000001976a9146bfd5c7fbe21529d45803dbcf0c87dd3c71efbc288ac0000000001000100000001ac4e164f5bc16746bb0868404292ac8318bbac3800e4aad13a014da427adce3e000000006a47304402203a61a2e931612b4bda08d541cfb980885173b8dcf64a3471238ae7abcd368d6402204cbf24f04b9aa2256d8901f0ed97866603d2be8324c2bfb7a37bf8fc90edd5b441210263e2dee22b1ddc5e11f6fab8bcd2378bdd19580d640501ea956ec0e786f93e76ffffffff013c660000000000001976a9146bfd5c7fbe21529d45803dbcf0c87dd3c71efbc288ac0000000000";

fn arb_hash() -> impl Strategy<Value = Hash> {
    prop::array::uniform32(any::<u8>()).prop_map(Hash::new)
}

/// A proof with random leaves and unique offsets per level.
fn arb_bump() -> impl Strategy<Value = Bump> {
    let arb_leaf = (0u64..256, arb_hash(), 0u8..3).prop_map(|(offset, hash, flag)| match flag {
        0 => BumpLeaf::new_data(offset, hash),
        1 => BumpLeaf::new_duplicate(offset),
        _ => BumpLeaf::new_txid(offset, hash),
    });
    let arb_level = prop::collection::vec(arb_leaf, 0..=4).prop_map(|mut level| {
        level.sort_by_key(|leaf| leaf.offset);
        level.dedup_by_key(|leaf| leaf.offset);
        level
    });

    (any::<u64>(), prop::collection::vec(arb_level, 0..=8))
        .prop_map(|(block_height, path)| Bump::new(block_height, path).unwrap())
}

/// Naive Merkle root of a power-of-two number of leaves.
fn naive_root(mut level: Vec<Hash>) -> Hash {
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| merkle_tree_parent(&pair[0], &pair[1]))
            .collect();
    }
    level[0]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pair_offset_is_an_involution(offset in any::<u64>()) {
        let pair = pair_offset(offset);
        prop_assert_eq!(pair_offset(pair), offset);
        if offset % 2 == 0 {
            prop_assert_eq!(pair, offset + 1);
        } else {
            prop_assert_eq!(pair, offset - 1);
        }
    }

    #[test]
    fn bump_bytes_roundtrip(bump in arb_bump()) {
        let bytes = bump.to_bytes();
        let decoded = Bump::from_bytes(&bytes).unwrap();
        prop_assert_eq!(&decoded, &bump);
        prop_assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn merkle_root_never_panics_and_is_idempotent(bump in arb_bump()) {
        let first = bump.compute_merkle_root();
        let second = bump.compute_merkle_root();
        prop_assert_eq!(format!("{:?}", first), format!("{:?}", second));
        if bump.txid_leaves().next().is_none() {
            prop_assert!(matches!(first, Ok(None)));
        }
    }

    #[test]
    fn compound_proof_matches_naive_root(
        height in 1usize..=4,
        hashes in prop::collection::vec(arb_hash(), 16),
        targets in prop::collection::vec(any::<bool>(), 16),
    ) {
        let width = 1usize << height;
        let leaves: Vec<Hash> = hashes[..width].to_vec();
        let expected = naive_root(leaves.clone());

        // Only level 0 is shipped; every higher node must be derived.
        let mut level0 = Vec::with_capacity(width);
        for (offset, hash) in leaves.iter().enumerate() {
            if targets[offset] || offset == 0 {
                level0.push(BumpLeaf::new_txid(offset as u64, *hash));
            } else {
                level0.push(BumpLeaf::new_data(offset as u64, *hash));
            }
        }
        let mut path = vec![level0];
        path.resize(height, Vec::new());
        let bump = Bump::new(1, path).unwrap();

        prop_assert_eq!(bump.compute_merkle_root().unwrap(), Some(expected));
        for offset in 0..width as u64 {
            prop_assert_eq!(bump.root_for_leaf(offset).unwrap(), expected);
        }
    }

    #[test]
    fn decoder_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = DecodedBeef::from_bytes(&data);
    }

    #[test]
    fn decoder_never_panics_after_marker(tail in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut data = vec![0x01, 0x00, 0xbe, 0xef];
        data.extend_from_slice(&tail);
        let _ = DecodedBeef::from_bytes(&data);
    }

    #[test]
    fn truncated_envelope_is_rejected(cut in 0usize..677) {
        let bytes = hex::decode(BRC62_HEX).unwrap();
        prop_assert!(DecodedBeef::from_bytes(&bytes[..cut]).is_err());
    }

    #[test]
    fn corrupted_envelope_never_panics(position in 0usize..677, value in any::<u8>()) {
        let mut bytes = hex::decode(BRC62_HEX).unwrap();
        bytes[position] = value;
        if let Ok(beef) = DecodedBeef::from_bytes(&bytes) {
            let _ = beef.merkle_roots();
        }
    }
}
