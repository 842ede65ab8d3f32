//! End-to-end certification of envelopes built with the encoder.

use std::collections::HashMap;

use paymail_primitives::chainhash::Hash;
use paymail_spv::{
    merkle_tree_parent, Bump, BumpLeaf, ChainTracker, DecodedBeef, ErrorCategory, ScriptFlags,
    ScriptVerificationError, ScriptVerifier, SpvConfig, SpvError, SpvValidator, TxData,
};
use paymail_transaction::{Script, Transaction, TransactionInput, TransactionOutput};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Toy interpreter: an input is valid when its unlocking script repeats
/// the funding output's locking script byte for byte.
struct EchoVerifier;

impl ScriptVerifier for EchoVerifier {
    fn verify(
        &self,
        tx: &Transaction,
        input_index: usize,
        funding_output: &TransactionOutput,
        flags: ScriptFlags,
    ) -> Result<(), ScriptVerificationError> {
        if !flags.has_flag(ScriptFlags::ENABLE_SIGHASH_FORKID) {
            return Err(ScriptVerificationError::new("fork id required"));
        }
        let unlocking = &tx.inputs[input_index].unlocking_script;
        if unlocking.to_bytes() == funding_output.locking_script.to_bytes() {
            Ok(())
        } else {
            Err(ScriptVerificationError::new("unlocking script does not echo locking script"))
        }
    }
}

struct OfflineTracker;

impl ChainTracker for OfflineTracker {
    fn merkle_root_for_height(&self, _height: u64) -> Result<Option<Hash>, SpvError> {
        Err(SpvError::ChainTracker("header service unreachable".to_string()))
    }
}

fn lock(tag: u8) -> Script {
    Script::from_bytes(&[0x76, 0xa9, tag])
}

/// A transaction with one output locked by `lock(tag)` that spends
/// `spends`, echoing each funding script.
fn tx(spends: &[(&Transaction, u32)], tag: u8) -> Transaction {
    let mut tx = Transaction::new();
    for (parent, vout) in spends {
        let mut input = TransactionInput::new(parent.tx_id(), *vout);
        input.unlocking_script = parent.outputs[*vout as usize].locking_script.clone();
        tx.add_input(input);
    }
    tx.add_output(TransactionOutput::new(5_000, lock(tag)));
    tx
}

struct Fixture {
    hex: String,
    root: Hash,
    grandparent: Transaction,
    uncle: Transaction,
    parent: Transaction,
    target: Transaction,
}

/// Block 900000 holds four transactions; the proof ships only level 0 and
/// anchors two of them. `parent` is unmined and spends both, `target`
/// spends `parent`.
fn fixture() -> Fixture {
    let grandparent = tx(&[], 1);
    let uncle = tx(&[], 2);
    let filler = [Hash::new([0x11; 32]), Hash::new([0x22; 32])];

    let root = merkle_tree_parent(
        &merkle_tree_parent(&filler[0], &grandparent.tx_id()),
        &merkle_tree_parent(&uncle.tx_id(), &filler[1]),
    );
    let bump = Bump::new(
        900_000,
        vec![
            vec![
                BumpLeaf::new_data(0, filler[0]),
                BumpLeaf::new_txid(1, grandparent.tx_id()),
                BumpLeaf::new_txid(2, uncle.tx_id()),
                BumpLeaf::new_data(3, filler[1]),
            ],
            vec![],
        ],
    ).unwrap();

    let parent = tx(&[(&grandparent, 0), (&uncle, 0)], 3);
    let target = tx(&[(&parent, 0)], 4);

    let beef = DecodedBeef::new(
        vec![bump],
        vec![
            TxData::mined(grandparent.clone(), 0),
            TxData::mined(uncle.clone(), 0),
            TxData::unmined(parent.clone()),
            TxData::unmined(target.clone()),
        ],
    )
    .unwrap();

    Fixture { hex: beef.to_hex(), root, grandparent, uncle, parent, target }
}

fn encode(bumps: Vec<Bump>, transactions: Vec<TxData>) -> String {
    DecodedBeef::new(bumps, transactions).unwrap().to_hex()
}

#[test]
fn certifies_a_chain_through_an_unmined_parent() {
    init_tracing();
    let f = fixture();
    let validator = SpvValidator::new(EchoVerifier);

    let cert = validator.certify_hex(&f.hex).unwrap();
    assert_eq!(cert.target_txid, f.target.tx_id());
    assert_eq!(cert.validated_txids, vec![f.target.tx_id(), f.parent.tx_id()]);

    let mut anchored: Vec<(Hash, u64)> = cert.anchors.iter().map(|a| (a.txid, a.offset)).collect();
    anchored.sort();
    let mut expected = vec![(f.grandparent.tx_id(), 1), (f.uncle.tx_id(), 2)];
    expected.sort();
    assert_eq!(anchored, expected);
    assert!(cert.anchors.iter().all(|a| a.merkle_root == f.root && a.block_height == 900_000));
    assert_eq!(cert.roots_to_confirm(), vec![(900_000, f.root)]);
}

#[test]
fn decoded_envelope_reports_roots_for_header_checks() {
    init_tracing();
    let f = fixture();
    let beef = DecodedBeef::from_hex(&f.hex).unwrap();
    assert_eq!(beef.merkle_roots().unwrap(), vec![(900_000, f.root)]);
    assert_eq!(beef.to_hex(), f.hex);
}

#[test]
fn chain_tracker_confirms_or_rejects_roots() {
    init_tracing();
    let f = fixture();
    let beef = DecodedBeef::from_hex(&f.hex).unwrap();
    let validator = SpvValidator::new(EchoVerifier);

    let headers: HashMap<u64, Hash> = [(900_000, f.root)].into_iter().collect();
    assert!(validator.certify_with_chain_tracker(&beef, &headers).is_ok());

    let stale: HashMap<u64, Hash> = [(900_000, Hash::new([0xee; 32]))].into_iter().collect();
    match validator.certify_with_chain_tracker(&beef, &stale) {
        Err(SpvError::InvalidMerkleRoot { block_height, root }) => {
            assert_eq!(block_height, 900_000);
            assert_eq!(root, f.root);
        }
        other => panic!("expected InvalidMerkleRoot, got {:?}", other),
    }

    let err = validator.certify_with_chain_tracker(&beef, &OfflineTracker).unwrap_err();
    assert!(matches!(err, SpvError::ChainTracker(_)));
    assert_eq!(err.category(), ErrorCategory::ChainView);
}

#[test]
fn bad_unlocking_script_names_the_input() {
    init_tracing();
    let grandparent = tx(&[], 1);
    let uncle = tx(&[], 2);
    let mut target = tx(&[(&grandparent, 0), (&uncle, 0)], 3);
    target.inputs[1].unlocking_script = lock(0xff);

    let bump = Bump::new(
        10,
        vec![vec![BumpLeaf::new_txid(0, grandparent.tx_id()), BumpLeaf::new_txid(1, uncle.tx_id())]],
    ).unwrap();
    let hex = encode(
        vec![bump],
        vec![TxData::mined(grandparent, 0), TxData::mined(uncle, 0), TxData::unmined(target.clone())],
    );

    match SpvValidator::new(EchoVerifier).certify_hex(&hex) {
        Err(SpvError::InvalidScript { txid, input_index, source }) => {
            assert_eq!(txid, target.tx_id());
            assert_eq!(input_index, 1);
            assert!(source.to_string().contains("does not echo"));
        }
        other => panic!("expected InvalidScript, got {:?}", other),
    }
}

#[test]
fn script_flags_come_from_config() {
    init_tracing();
    let f = fixture();
    let config = SpvConfig::default().with_script_flags(ScriptFlags::UTXO_AFTER_GENESIS);
    let err = SpvValidator::with_config(EchoVerifier, config).certify_hex(&f.hex).unwrap_err();
    assert!(matches!(err, SpvError::InvalidScript { .. }));
}

#[test]
fn open_lock_time_on_target_is_rejected() {
    init_tracing();
    let parent = tx(&[], 1);
    let mut target = tx(&[(&parent, 0)], 2);
    target.lock_time = 500_000;
    target.inputs[0].sequence_number = 1;
    let bump = Bump::new(3, vec![vec![BumpLeaf::new_txid(0, parent.tx_id()), BumpLeaf::new_duplicate(1)]]).unwrap();
    let hex = encode(vec![bump.clone()], vec![TxData::mined(parent.clone(), 0), TxData::unmined(target.clone())]);

    let err = SpvValidator::new(EchoVerifier).certify_hex(&hex).unwrap_err();
    assert!(matches!(err, SpvError::LockTimeNotFinal { lock_time: 500_000, input_index: 0, sequence: 1, .. }));

    target.inputs[0].sequence_number = u32::MAX;
    let hex = encode(vec![bump], vec![TxData::mined(parent, 0), TxData::unmined(target)]);
    assert!(SpvValidator::new(EchoVerifier).certify_hex(&hex).is_ok());
}

#[test]
fn parent_missing_from_bundle() {
    init_tracing();
    let unrelated = tx(&[], 1);
    let absent = tx(&[], 2);
    let target = tx(&[(&absent, 0)], 3);
    let bump = Bump::new(3, vec![vec![BumpLeaf::new_txid(0, unrelated.tx_id()), BumpLeaf::new_duplicate(1)]]).unwrap();
    let hex = encode(vec![bump], vec![TxData::mined(unrelated, 0), TxData::unmined(target)]);

    let err = SpvValidator::new(EchoVerifier).certify_hex(&hex).unwrap_err();
    match &err {
        SpvError::NoMatchingTransactionForInput { source_txid, input_index, .. } => {
            assert_eq!(*source_txid, absent.tx_id());
            assert_eq!(*input_index, 0);
        }
        other => panic!("expected NoMatchingTransactionForInput, got {:?}", other),
    }
    assert_eq!(err.category(), ErrorCategory::StructuralInconsistency);
}

#[test]
fn proof_missing_a_sibling_fails_anchoring() {
    init_tracing();
    let parent = tx(&[], 1);
    let target = tx(&[(&parent, 0)], 2);
    // Offset 1 is absent, so the climb from the parent's leaf cannot start.
    let bump = Bump::new(3, vec![vec![BumpLeaf::new_txid(0, parent.tx_id())]]).unwrap();
    let hex = encode(vec![bump], vec![TxData::mined(parent, 0), TxData::unmined(target)]);

    assert!(matches!(
        SpvValidator::new(EchoVerifier).certify_hex(&hex),
        Err(SpvError::ChildNotFound { level: 0, offset: 1 })
    ));
}
