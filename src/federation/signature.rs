//! HTTP Signatures for outbound ActivityPub delivery
//!
//! Signing per https://docs.joinmastodon.org/spec/security/. Inbound
//! verification happens upstream of this engine.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

/// Headers to add to a signed request.
#[derive(Debug, Clone)]
pub struct SignatureHeaders {
    /// Signature header value
    pub signature: String,
    /// Date header value (RFC 2822)
    pub date: String,
    /// Digest header value (if body present)
    pub digest: Option<String>,
}

/// Sign an outgoing HTTP request.
///
/// # Arguments
/// * `method` - HTTP method (e.g., "POST")
/// * `url` - Full URL being requested
/// * `body` - Request body (for digest)
/// * `private_key_pem` - RSA private key in PKCS#8 PEM format
/// * `key_id` - Full URL to the public key (actor#main-key)
///
/// # Returns
/// Headers to add: Signature, Date, Digest (if body present)
pub fn sign_request(
    method: &str,
    url: &str,
    body: Option<&[u8]>,
    private_key_pem: &str,
    key_id: &str,
) -> Result<SignatureHeaders> {
    let parsed_url =
        url::Url::parse(url).map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

    let host = parsed_url
        .host_str()
        .ok_or_else(|| AppError::Validation("Missing host in URL".to_string()))?;

    let path = parsed_url.path();
    let path_and_query = match parsed_url.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };

    let date = chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();

    let digest = body.map(generate_digest);

    let request_target = format!("{} {}", method.to_lowercase(), path_and_query);

    let mut signing_parts = vec![
        format!("(request-target): {}", request_target),
        format!("host: {}", host),
        format!("date: {}", date),
    ];
    let mut headers_list = vec!["(request-target)", "host", "date"];

    if let Some(ref digest_value) = digest {
        signing_parts.push(format!("digest: {}", digest_value));
        headers_list.push("digest");
    }

    let signing_string = signing_parts.join("\n");

    use rsa::pkcs8::DecodePrivateKey;
    use rsa::signature::{RandomizedSigner, SignatureEncoding};

    let private_key = rsa::RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| AppError::Validation(format!("Invalid private key: {}", e)))?;

    // new_unprefixed for compatibility with Mastodon-family servers.
    let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new_unprefixed(private_key);
    let mut rng = rand::thread_rng();
    let signature = signing_key.sign_with_rng(&mut rng, signing_string.as_bytes());
    let signature_b64 = BASE64.encode(signature.to_bytes());

    let signature_header = format!(
        "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
        key_id,
        headers_list.join(" "),
        signature_b64
    );

    Ok(SignatureHeaders {
        signature: signature_header,
        date,
        digest,
    })
}

/// SHA-256 digest of a request body, as `SHA-256=base64(hash)`.
pub fn generate_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    let hash = hasher.finalize();
    format!("SHA-256={}", BASE64.encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rsa::signature::Verifier;
    use rsa::{RsaPrivateKey, RsaPublicKey};

    fn generate_test_keypair() -> (String, RsaPublicKey) {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 1024).expect("key generation should work");
        let public_key = RsaPublicKey::from(&private_key);

        let private_key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("private key pem")
            .to_string();

        (private_key_pem, public_key)
    }

    #[test]
    fn digest_has_expected_shape() {
        let digest = generate_digest(b"{}");
        assert!(digest.starts_with("SHA-256="));
    }

    #[test]
    fn signed_request_carries_digest_for_body() {
        let (private_key_pem, _) = generate_test_keypair();
        let signed = sign_request(
            "POST",
            "https://remote.example/inbox",
            Some(br#"{"type":"Like"}"#),
            &private_key_pem,
            "https://local.example/users/alice#main-key",
        )
        .expect("signed");

        assert!(signed.digest.is_some());
        assert!(signed.signature.contains("headers=\"(request-target) host date digest\""));
        assert!(signed
            .signature
            .contains("keyId=\"https://local.example/users/alice#main-key\""));
    }

    #[test]
    fn signature_verifies_against_reconstructed_signing_string() {
        let (private_key_pem, public_key) = generate_test_keypair();
        let body = br#"{"type":"Follow"}"#;
        let signed = sign_request(
            "POST",
            "https://remote.example/inbox?foo=bar",
            Some(body),
            &private_key_pem,
            "https://local.example/users/alice#main-key",
        )
        .expect("signed");

        let signing_string = format!(
            "(request-target): post /inbox?foo=bar\nhost: remote.example\ndate: {}\ndigest: {}",
            signed.date,
            signed.digest.as_deref().unwrap(),
        );

        let signature_b64 = signed
            .signature
            .split("signature=\"")
            .nth(1)
            .and_then(|s| s.strip_suffix('"'))
            .expect("signature field");
        let signature_bytes = BASE64.decode(signature_b64).expect("base64 signature");

        let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new_unprefixed(public_key);
        let signature =
            rsa::pkcs1v15::Signature::try_from(signature_bytes.as_slice()).expect("signature");
        verifier
            .verify(signing_string.as_bytes(), &signature)
            .expect("signature should verify");
    }

    #[test]
    fn rejects_url_without_host() {
        let (private_key_pem, _) = generate_test_keypair();
        let result = sign_request(
            "POST",
            "not a url",
            None,
            &private_key_pem,
            "https://local.example/users/alice#main-key",
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
