#![no_main]
use bastion_iam::ArtifactSigner;
use libfuzzer_sys::fuzz_target;

// Decoding arbitrary input must never panic, and anything that decodes must
// re-encode to an artifact that decodes to the same claims.
fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let signer = ArtifactSigner::new("fuzz-signing-secret");
    if let Ok(claims) = signer.decode(input) {
        let reencoded = signer.encode(&claims).expect("claims serialize");
        assert_eq!(signer.decode(&reencoded).ok(), Some(claims));
    }
});
