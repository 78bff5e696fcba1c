//! End-to-end synchronization rounds: signatures, wire transfer, delta,
//! patch.

use deltasync::{
    apply_delta, apply_to_vec, compute_delta, decode_delta, decode_signatures, encode_delta,
    encode_signatures, generate_signatures, DeltaOp, SyncError,
};
use rand::Rng;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use tempfile::TempDir;

/// Run a full round: sign the base, ship the signatures over the wire,
/// compute the delta, ship it back, and reconstruct.
fn sync_round(base: &[u8], source: &[u8], block_size: u32) -> Vec<u8> {
    let signatures = generate_signatures(Cursor::new(base), block_size).unwrap();
    let signatures = decode_signatures(&encode_signatures(&signatures)).unwrap();

    let delta = compute_delta(&signatures, Cursor::new(source)).unwrap();
    let delta = decode_delta(&encode_delta(&delta)).unwrap();

    apply_to_vec(base, &delta).unwrap()
}

#[test]
fn round_trip_reconstructs_source() {
    let base = b"The quick brown fox jumps over the lazy dog. ".repeat(20);
    let mut source = base.clone();
    source.splice(
        100..140,
        b"forty bytes of replacement text go here!".iter().copied(),
    );
    source.extend_from_slice(b"plus a tail");

    for block_size in [1, 3, 16, 64, 4096] {
        assert_eq!(sync_round(&base, &source, block_size), source);
    }
}

#[test]
fn identity_round_has_no_literals() {
    // Length 1000 is not a multiple of 48, so the final block is short and
    // must still come back as a Copy.
    let base: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();

    let signatures = generate_signatures(Cursor::new(&base), 48).unwrap();
    let delta = compute_delta(&signatures, Cursor::new(&base)).unwrap();

    let mut covered = 0u64;
    for op in delta.ops() {
        match op {
            DeltaOp::Copy { offset, length } => {
                assert_eq!(*offset, covered, "copies must cover the base in order");
                covered += u64::from(*length);
            }
            DeltaOp::Literal { .. } => panic!("identity delta must not carry literals"),
        }
    }
    assert_eq!(covered, base.len() as u64);
}

#[test]
fn empty_base_yields_single_literal() {
    let source = b"all of this is new";
    let signatures = generate_signatures(Cursor::new(b""), 4).unwrap();
    assert!(signatures.is_empty());

    let delta = compute_delta(&signatures, Cursor::new(source)).unwrap();
    assert_eq!(
        delta.ops(),
        &[DeltaOp::Literal {
            bytes: source.to_vec()
        }]
    );
    assert_eq!(apply_to_vec(b"", &delta).unwrap(), source);
}

#[test]
fn scenario_insertion() {
    let signatures = generate_signatures(Cursor::new(b"ABCDEFGH"), 4).unwrap();
    let delta = compute_delta(&signatures, Cursor::new(b"ABCDZZZZEFGH")).unwrap();

    assert_eq!(
        delta.ops(),
        &[
            DeltaOp::Copy { offset: 0, length: 4 },
            DeltaOp::Literal {
                bytes: b"ZZZZ".to_vec()
            },
            DeltaOp::Copy { offset: 4, length: 4 },
        ]
    );
}

#[test]
fn scenario_deletion() {
    let signatures = generate_signatures(Cursor::new(b"ABCDEFGH"), 4).unwrap();
    let delta = compute_delta(&signatures, Cursor::new(b"EFGH")).unwrap();

    assert_eq!(delta.ops(), &[DeltaOp::Copy { offset: 4, length: 4 }]);
}

#[test]
fn scenario_alignment_breaking_edit() {
    let signatures = generate_signatures(Cursor::new(b"ABCDEFGH"), 4).unwrap();
    let delta = compute_delta(&signatures, Cursor::new(b"ABCXEFGH")).unwrap();

    assert_eq!(
        delta.ops(),
        &[
            DeltaOp::Literal {
                bytes: b"ABCX".to_vec()
            },
            DeltaOp::Copy { offset: 4, length: 4 },
        ]
    );
}

#[test]
fn scenario_stale_signatures_fail_out_of_range() {
    // Delta built against the full 8-byte base, applied to a base truncated
    // to 4 bytes.
    let signatures = generate_signatures(Cursor::new(b"ABCDEFGH"), 4).unwrap();
    let delta = compute_delta(&signatures, Cursor::new(b"EFGH")).unwrap();

    let result = apply_to_vec(b"ABCD", &delta);
    assert!(matches!(
        result,
        Err(SyncError::OutOfRange {
            offset: 4,
            length: 4,
            base_len: 4,
        })
    ));
}

#[test]
fn no_adjacent_literals_on_random_data() {
    let mut rng = rand::thread_rng();
    let base: Vec<u8> = (0..8192).map(|_| rng.gen()).collect();
    let mut source = base.clone();
    for _ in 0..50 {
        let at = rng.gen_range(0..source.len());
        source[at] = rng.gen();
    }
    source.extend((0..512).map(|_| rng.gen::<u8>()));

    let signatures = generate_signatures(Cursor::new(&base), 128).unwrap();
    let delta = compute_delta(&signatures, Cursor::new(&source)).unwrap();

    let adjacent = delta.ops().windows(2).any(|pair| {
        matches!(pair[0], DeltaOp::Literal { .. }) && matches!(pair[1], DeltaOp::Literal { .. })
    });
    assert!(!adjacent, "literal runs must be coalesced into one op");

    assert_eq!(apply_to_vec(&base, &delta).unwrap(), source);
}

#[test]
fn codec_round_trips() {
    let base = b"0123456789abcdef".repeat(32);
    let mut source = base.clone();
    source.truncate(400);
    source.extend_from_slice(b"tail");

    let signatures = generate_signatures(Cursor::new(&base), 16).unwrap();
    assert_eq!(
        decode_signatures(&encode_signatures(&signatures)).unwrap(),
        signatures
    );

    let delta = compute_delta(&signatures, Cursor::new(&source)).unwrap();
    assert_eq!(decode_delta(&encode_delta(&delta)).unwrap(), delta);
}

#[test]
fn file_backed_round() {
    let dir = TempDir::new().unwrap();
    let base_path = dir.path().join("base.bin");
    let out_path = dir.path().join("reconstructed.bin");

    let base: Vec<u8> = (0..100_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let mut source = base.clone();
    source[40_000..40_100].fill(0xEE);

    File::create(&base_path).unwrap().write_all(&base).unwrap();

    // Sign the base straight from the file.
    let signatures = generate_signatures(File::open(&base_path).unwrap(), 1024).unwrap();
    let delta = compute_delta(&signatures, Cursor::new(&source)).unwrap();

    let stats = delta.stats();
    assert!(stats.copy_ratio() > 0.9, "most of the file is unchanged");

    let mut base_file = File::open(&base_path).unwrap();
    let mut out_file = File::create(&out_path).unwrap();
    let written = apply_delta(&mut base_file, &delta, &mut out_file).unwrap();
    assert_eq!(written, source.len() as u64);

    let mut reconstructed = Vec::new();
    let mut out_file = File::open(&out_path).unwrap();
    out_file.seek(SeekFrom::Start(0)).unwrap();
    out_file.read_to_end(&mut reconstructed).unwrap();
    assert_eq!(reconstructed, source);
}

#[test]
fn value_types_survive_json() {
    let signatures = generate_signatures(Cursor::new(b"ABCDEFGHIJ"), 4).unwrap();
    let json = serde_json::to_string(&signatures).unwrap();
    let restored: deltasync::SignatureSet = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, signatures);

    let delta = compute_delta(&signatures, Cursor::new(b"ABCD__IJ")).unwrap();
    let json = serde_json::to_string(&delta).unwrap();
    let restored: deltasync::Delta = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, delta);
}

#[test]
fn concurrent_rounds_share_nothing() {
    let signatures =
        std::sync::Arc::new(generate_signatures(Cursor::new(b"ABCDEFGH".repeat(64)), 8).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let signatures = signatures.clone();
            std::thread::spawn(move || {
                let base = b"ABCDEFGH".repeat(64);
                let mut source = base.clone();
                source[i * 16] = b'!';
                let delta = compute_delta(&signatures, Cursor::new(&source)).unwrap();
                assert_eq!(apply_to_vec(&base, &delta).unwrap(), source);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
