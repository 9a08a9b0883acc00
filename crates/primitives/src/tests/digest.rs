use super::*;

const CONTENT: &[u8] = br#"{"resourceName":"Europarl"}"#;
const ENVELOPE: &[u8] = br#"{"identifier":"00","revision":1}"#;

#[test]
fn test_digest_is_deterministic() {
    let a = compute_digest(CONTENT, ENVELOPE).unwrap();
    let b = compute_digest(CONTENT, ENVELOPE).unwrap();

    assert_eq!(a, b);
}

#[test]
fn test_single_byte_change_changes_digest() {
    let base = compute_digest(CONTENT, ENVELOPE).unwrap();

    for i in 0..CONTENT.len() {
        let mut content = CONTENT.to_vec();
        content[i] ^= 0x01;

        assert_ne!(
            compute_digest(&content, ENVELOPE).unwrap(),
            base,
            "flipping content byte {i} should change the digest"
        );
    }

    for i in 0..ENVELOPE.len() {
        let mut envelope = ENVELOPE.to_vec();
        envelope[i] ^= 0x01;

        assert_ne!(
            compute_digest(CONTENT, &envelope).unwrap(),
            base,
            "flipping envelope byte {i} should change the digest"
        );
    }
}

#[test]
fn test_boundary_between_inputs_matters() {
    let a = compute_digest(b"ab", b"c").unwrap();
    let b = compute_digest(b"a", b"bc").unwrap();

    assert_ne!(a, b);
}

#[test]
fn test_empty_inputs_are_rejected() {
    assert_eq!(
        compute_digest(b"", ENVELOPE),
        Err(DigestError::InvalidInput(DigestInput::Content))
    );
    assert_eq!(
        compute_digest(CONTENT, b""),
        Err(DigestError::InvalidInput(DigestInput::Envelope))
    );
}

#[test]
fn test_hex_roundtrip() {
    let digest = compute_digest(CONTENT, ENVELOPE).unwrap();
    let hex = digest.to_string();

    assert_eq!(hex.len(), 64);
    assert_eq!(hex.parse::<Digest>().unwrap(), digest);
    assert_eq!(
        "not-a-digest".parse::<Digest>(),
        Err(DigestError::InvalidEncoding)
    );
}
