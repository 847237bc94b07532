//! AWS Signature Version 4 query-parameter signing for the WebSocket dial.
//!
//! Used when the process authenticates with fleet credentials instead of an
//! auth token. The signature covers the GET request the WebSocket handshake
//! performs: canonical query over the identity parameters plus the `X-Amz-*`
//! set, signed headers fixed to `host`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use super::AwsCredentials;
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "gamelift";
/// SHA-256 of the empty string; WebSocket handshakes carry no body.
const EMPTY_PAYLOAD_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// The `X-Amz-*` query parameters produced by signing, in append order.
#[derive(Debug, Clone, Default)]
pub struct SigV4QueryParameters {
    pub pairs: Vec<(String, String)>,
}

/// Percent-encode per SigV4 rules: everything except unreserved characters.
fn aws_uri_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

fn canonical_query(pairs: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (aws_uri_encode(k), aws_uri_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn hmac_sha256(key: &[u8], data: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Sign the handshake GET and return the `X-Amz-*` parameters to append to
/// the connection query.
///
/// `base_pairs` are the identity parameters covered by the signature
/// (process id, compute id, fleet id).
pub fn generate_signed_query_parameters(
    websocket_url: &str,
    base_pairs: &[(String, String)],
    region: &str,
    credentials: &AwsCredentials,
    now: DateTime<Utc>,
) -> Result<SigV4QueryParameters> {
    if credentials.access_key.is_empty() || credentials.secret_key.is_empty() {
        return Err(Error::validation("AwsCredentials", "access key and secret are required"));
    }

    let url = Url::parse(websocket_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::validation("WebSocketUrl", "must carry a host"))?
        .to_string();
    let path = if url.path().is_empty() { "/" } else { url.path() };

    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{region}/{SERVICE}/aws4_request");

    let mut pairs: Vec<(String, String)> = base_pairs.to_vec();
    pairs.push(("X-Amz-Algorithm".into(), ALGORITHM.into()));
    pairs.push((
        "X-Amz-Credential".into(),
        format!("{}/{scope}", credentials.access_key),
    ));
    pairs.push(("X-Amz-Date".into(), amz_date.clone()));
    pairs.push(("X-Amz-SignedHeaders".into(), "host".into()));
    if !credentials.session_token.is_empty() {
        pairs.push(("X-Amz-Security-Token".into(), credentials.session_token.clone()));
    }

    let canonical_request = format!(
        "GET\n{path}\n{}\nhost:{host}\n\nhost\n{EMPTY_PAYLOAD_HASH}",
        canonical_query(&pairs)
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(&canonical_request)
    );

    let secret = format!("AWS4{}", credentials.secret_key);
    let k_date = hmac_sha256(secret.as_bytes(), &date);
    let k_region = hmac_sha256(&k_date, region);
    let k_service = hmac_sha256(&k_region, SERVICE);
    let k_signing = hmac_sha256(&k_service, "aws4_request");
    let signature = hex::encode(hmac_sha256(&k_signing, &string_to_sign));

    let mut signed: Vec<(String, String)> =
        pairs.split_off(base_pairs.len());
    signed.push(("X-Amz-Signature".into(), signature));

    Ok(SigV4QueryParameters { pairs: signed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
    }

    fn credentials() -> AwsCredentials {
        AwsCredentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI", "")
    }

    fn base_pairs() -> Vec<(String, String)> {
        vec![
            ("pID".into(), "proc-1".into()),
            ("ComputeId".into(), "host-1".into()),
            ("FleetId".into(), "fleet-1".into()),
        ]
    }

    #[test]
    fn produces_the_full_amz_parameter_set() {
        let signed = generate_signed_query_parameters(
            "wss://example.test/",
            &base_pairs(),
            "us-west-2",
            &credentials(),
            fixed_now(),
        )
        .unwrap();

        let keys: Vec<&str> = signed.pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            [
                "X-Amz-Algorithm",
                "X-Amz-Credential",
                "X-Amz-Date",
                "X-Amz-SignedHeaders",
                "X-Amz-Signature",
            ]
        );
        let date = signed.pairs.iter().find(|(k, _)| k == "X-Amz-Date").unwrap();
        assert_eq!(date.1, "20231114T221320Z");
        let credential = signed.pairs.iter().find(|(k, _)| k == "X-Amz-Credential").unwrap();
        assert_eq!(credential.1, "AKIDEXAMPLE/20231114/us-west-2/gamelift/aws4_request");
        let signature = signed.pairs.iter().find(|(k, _)| k == "X-Amz-Signature").unwrap();
        assert_eq!(signature.1.len(), 64);
        assert!(signature.1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn session_token_is_included_when_present() {
        let mut creds = credentials();
        creds.session_token = "tok".into();
        let signed = generate_signed_query_parameters(
            "wss://example.test/",
            &base_pairs(),
            "us-west-2",
            &creds,
            fixed_now(),
        )
        .unwrap();
        assert!(signed.pairs.iter().any(|(k, v)| k == "X-Amz-Security-Token" && v == "tok"));
    }

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        let a = generate_signed_query_parameters(
            "wss://example.test/",
            &base_pairs(),
            "us-west-2",
            &credentials(),
            fixed_now(),
        )
        .unwrap();
        let b = generate_signed_query_parameters(
            "wss://example.test/",
            &base_pairs(),
            "us-west-2",
            &credentials(),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(a.pairs, b.pairs);
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = generate_signed_query_parameters(
            "wss://example.test/",
            &base_pairs(),
            "us-west-2",
            &AwsCredentials::default(),
            fixed_now(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("AwsCredentials"));
    }

    #[test]
    fn uri_encoding_keeps_unreserved_characters() {
        assert_eq!(aws_uri_encode("abc-123_.~"), "abc-123_.~");
        assert_eq!(aws_uri_encode("a b/c"), "a%20b%2Fc");
    }
}
