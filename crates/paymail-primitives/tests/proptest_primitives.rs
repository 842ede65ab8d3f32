use proptest::prelude::*;

use paymail_primitives::chainhash::Hash;
use paymail_primitives::util::{BsvReader, BsvWriter, VarInt};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn hash_hex_roundtrip(bytes in prop::array::uniform32(any::<u8>())) {
        let hash = Hash::new(bytes);
        let hex_str = hash.to_string();
        let hash2 = Hash::from_hex(&hex_str).unwrap();
        prop_assert_eq!(hash.as_bytes(), hash2.as_bytes());
    }

    #[test]
    fn hash_from_hex_never_panics(s in "[0-9a-fA-Fxz]{0,80}") {
        let result = Hash::from_hex(&s);
        if s.len() != 64 && !s.is_empty() {
            prop_assert!(result.is_err());
        }
    }

    #[test]
    fn varint_length_matches_encoding(v in any::<u64>()) {
        let vi = VarInt(v);
        let mut writer = BsvWriter::new();
        writer.write_varint(vi);
        prop_assert_eq!(writer.len(), vi.length());

        let bytes = writer.into_bytes();
        let mut reader = BsvReader::new(&bytes);
        prop_assert_eq!(reader.read_varint().unwrap(), vi);
        prop_assert!(reader.is_empty());
    }

    #[test]
    fn reader_never_panics(data in prop::collection::vec(any::<u8>(), 0..32), n in 0usize..64) {
        let mut reader = BsvReader::new(&data);
        let _ = reader.read_varint();
        let before = reader.remaining();
        match reader.read_bytes(n) {
            Ok(slice) => prop_assert_eq!(slice.len(), n),
            Err(_) => prop_assert_eq!(reader.remaining(), before),
        }
    }
}
