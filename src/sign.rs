//! OAuth 1.0a HMAC-SHA1 request signing.

use std::collections::BTreeMap;
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha1::Sha1;

use crate::credential::Credential;

type HmacSha1 = Hmac<Sha1>;

/// Request parameters, keyed by name.
pub type Params = BTreeMap<String, String>;

pub(crate) const OAUTH_SIGNATURE: &str = "oauth_signature";

/// Percent-encodes a string per RFC 3986 §2.3.
///
/// Unreserved characters (A-Z, a-z, 0-9, '-', '.', '_', '~') are NOT encoded.
/// Every other byte, including `/`, `+`, `*`, `%` and space, becomes `%XX`
/// with uppercase hex digits.
pub fn percent_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len() * 3);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}

/// Joins `enc(key)=enc(value)` pairs with `&`.
///
/// With `sorted`, pairs are ordered byte-wise on the encoded `key=value`
/// string. Encoding can change relative order, so sorting happens after it.
pub fn canonical_param_string<I, K, V>(params: I, sorted: bool) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<String> = params
        .into_iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                percent_encode(k.as_ref()),
                percent_encode(v.as_ref())
            )
        })
        .collect();
    if sorted {
        pairs.sort_unstable();
    }
    pairs.join("&")
}

/// Builds the signature base string: `METHOD&enc(uri)&enc(canonical params)`.
pub fn signature_base_string(http_method: &str, uri: &str, params: &Params) -> String {
    format!(
        "{}&{}&{}",
        http_method,
        percent_encode(uri),
        percent_encode(&canonical_param_string(params, true))
    )
}

/// Computes the HMAC-SHA1 signature over fully populated parameters.
///
/// This is a pure function: `params` must already carry the `oauth_*` values
/// (see [`Signer::sign`]). The server re-derives the same value from the
/// query it receives.
pub fn signature(credential: &Credential, http_method: &str, uri: &str, params: &Params) -> String {
    let base = signature_base_string(http_method, uri, params);
    let key = format!(
        "{}&{}",
        percent_encode(&credential.consumer_secret),
        percent_encode(&credential.access_secret)
    );

    // HMAC accepts keys of any length, new_from_slice never fails.
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(base.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Writes the protocol parameters for one request attempt into `params`.
pub fn insert_oauth_params(
    params: &mut Params,
    credential: &Credential,
    timestamp: i64,
    nonce: &str,
) {
    params.insert("oauth_signature_method".into(), "HMAC-SHA1".into());
    params.insert("oauth_version".into(), "1.0".into());
    params.insert("oauth_consumer_key".into(), credential.consumer_key.clone());
    params.insert("oauth_timestamp".into(), timestamp.to_string());
    params.insert("oauth_nonce".into(), nonce.to_string());
    if credential.has_access() {
        params.insert("oauth_token".into(), credential.access_key.clone());
    }
}

/// Signs requests with a per-client random source.
///
/// Every call draws a fresh nonce and timestamp, so a signed parameter set
/// is good for exactly one attempt.
pub struct Signer {
    rng: Mutex<Box<dyn RngCore + Send>>,
    time: Option<i64>,
}

impl Default for Signer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").field("time", &self.time).finish()
    }
}

impl Signer {
    /// Creates a signer backed by an OS-seeded generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates a signer drawing nonces and multipart boundaries from `rng`.
    pub fn with_rng(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            rng: Mutex::new(Box::new(rng)),
            time: None,
        }
    }

    /// Pins the signing timestamp.
    ///
    /// # Note
    ///
    /// Requests should always be signed with the current time.
    /// Only use this function for testing.
    pub fn with_time(mut self, timestamp: i64) -> Self {
        self.time = Some(timestamp);
        self
    }

    fn timestamp(&self) -> i64 {
        self.time.unwrap_or_else(|| chrono::Utc::now().timestamp())
    }

    /// Decimal rendering of a uniformly random 63-bit integer.
    pub fn nonce(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        (rng.next_u64() >> 1).to_string()
    }

    pub(crate) fn fill_bytes(&self, dest: &mut [u8]) {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.fill_bytes(dest);
    }

    /// Injects the `oauth_*` parameters into `params` and returns the signature.
    ///
    /// The signature itself is not inserted; the caller attaches it last.
    pub fn sign(
        &self,
        credential: &Credential,
        http_method: &str,
        uri: &str,
        params: &mut Params,
    ) -> String {
        let nonce = self.nonce();
        insert_oauth_params(params, credential, self.timestamp(), &nonce);
        signature(credential, http_method, uri, params)
    }

    /// Signs the request and renders the full URL with the signature appended.
    pub fn signed_url(
        &self,
        credential: &Credential,
        http_method: &str,
        uri: &str,
        mut params: Params,
    ) -> String {
        let signature = self.sign(credential, http_method, uri, &mut params);
        let query = canonical_param_string(&params, true);
        log::debug!("signed {} {}?{}", http_method, uri, query);
        format!(
            "{}?{}&{}={}",
            uri,
            query,
            OAUTH_SIGNATURE,
            percent_encode(&signature)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::mock::StepRng;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn percent_encode_unreserved_chars() {
        assert_eq!(percent_encode("abcXYZ019"), "abcXYZ019");
        assert_eq!(percent_encode("-._~"), "-._~");
    }

    #[test]
    fn percent_encode_reserved_chars() {
        assert_eq!(percent_encode(" "), "%20");
        assert_eq!(percent_encode("/"), "%2F");
        assert_eq!(percent_encode("+"), "%2B");
        assert_eq!(percent_encode("*"), "%2A");
        assert_eq!(percent_encode("%"), "%25");
        assert_eq!(percent_encode("="), "%3D");
        assert_eq!(percent_encode("&"), "%26");
    }

    #[test]
    fn percent_encode_utf8_bytes() {
        assert_eq!(percent_encode("快盘"), "%E5%BF%AB%E7%9B%98");
    }

    #[test]
    fn percent_encode_is_not_idempotent_on_reserved_input() {
        let once = percent_encode("a b/c+d*e%f~");
        assert_eq!(once, "a%20b%2Fc%2Bd%2Ae%25f~");
        let twice = percent_encode(&once);
        assert_eq!(twice, "a%2520b%252Fc%252Bd%252Ae%2525f~");
        assert_ne!(once, twice);
    }

    #[test]
    fn percent_encode_is_idempotent_on_unreserved_input() {
        let s = "Docs-2012_v1.0~final";
        assert_eq!(percent_encode(&percent_encode(s)), percent_encode(s));
    }

    #[test]
    fn canonical_sorted_orders_encoded_pairs() {
        let forward = vec![("a", "2"), ("a b", "1"), ("A", "4"), ("a-b", "3")];
        let mut backward = forward.clone();
        backward.reverse();

        let expected = "A=4&a%20b=1&a-b=3&a=2";
        assert_eq!(canonical_param_string(forward, true), expected);
        assert_eq!(canonical_param_string(backward, true), expected);
    }

    #[test]
    fn canonical_unsorted_keeps_iteration_order() {
        let pairs = vec![("z", "1"), ("a", "x y")];
        assert_eq!(canonical_param_string(pairs, false), "z=1&a=x%20y");
    }

    #[test]
    fn canonical_empty() {
        assert_eq!(canonical_param_string(&Params::new(), true), "");
    }

    #[test]
    fn signature_reference_vector_with_both_secrets() {
        // RFC 5849 §1.2.
        let credential = Credential::new("dpf43f3p2l4k3l03", "kd94hf93k423kf44")
            .with_access("nnch734d00sl2jdk", "pfkkdhi9sl3r4s00");
        let mut p = params(&[("file", "vacation.jpg"), ("size", "original")]);
        insert_oauth_params(&mut p, &credential, 1191242096, "kllo9940pd9333jh");

        assert_eq!(
            signature_base_string("GET", "http://photos.example.net/photos", &p),
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg\
             %26oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3Dkllo9940pd9333jh\
             %26oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1191242096\
             %26oauth_token%3Dnnch734d00sl2jdk%26oauth_version%3D1.0%26size%3Doriginal"
        );
        assert_eq!(
            signature(&credential, "GET", "http://photos.example.net/photos", &p),
            "tR3+Ty81lMeYAr/Fid0kMTYa/WM="
        );
    }

    #[test]
    fn signature_reference_vector_with_empty_token_secret() {
        let credential = Credential::new("xcFyEgGDAc5Wnz1s", "Vn3t8QPh5mBNrU4s");
        let mut p = params(&[("oauth_callback", "http://localhost/cb?x=1 2")]);
        insert_oauth_params(&mut p, &credential, 1349150400, "4916498537128503421");

        assert!(!p.contains_key("oauth_token"));
        assert_eq!(
            signature(
                &credential,
                "GET",
                "https://openapi.kuaipan.cn/open/requestToken",
                &p
            ),
            "2YUQjAKFq9Nj3apigK26rOKUsIg="
        );
    }

    #[test]
    fn sign_injects_oauth_params_but_not_signature() {
        let credential = Credential::new("ck", "cs").with_access("tok", "ts");
        let signer = Signer::with_rng(StepRng::new(84, 0)).with_time(1349150400);
        let mut p = params(&[("list", "true")]);

        let sig = signer.sign(
            &credential,
            "GET",
            "http://openapi.kuaipan.cn/1/metadata/app_folder/docs",
            &mut p,
        );

        assert_eq!(p["oauth_signature_method"], "HMAC-SHA1");
        assert_eq!(p["oauth_version"], "1.0");
        assert_eq!(p["oauth_consumer_key"], "ck");
        assert_eq!(p["oauth_timestamp"], "1349150400");
        assert_eq!(p["oauth_nonce"], "42");
        assert_eq!(p["oauth_token"], "tok");
        assert!(!p.contains_key(OAUTH_SIGNATURE));
        assert_eq!(sig, "jOnrO65KnM3d/4Q1V2tTpJYTc/0=");
    }

    #[test]
    fn nonce_is_63_bit() {
        let signer = Signer::with_rng(StepRng::new(u64::MAX, 0));
        assert_eq!(signer.nonce(), i64::MAX.to_string());
    }

    #[test]
    fn nonces_differ_between_calls() {
        let signer = Signer::new();
        assert_ne!(signer.nonce(), signer.nonce());
    }

    #[test]
    fn signed_url_appends_encoded_signature_last() {
        let credential = Credential::new("ck", "cs").with_access("tok", "ts");
        let signer = Signer::with_rng(StepRng::new(84, 0)).with_time(1349150400);

        let url = signer.signed_url(
            &credential,
            "GET",
            "http://openapi.kuaipan.cn/1/metadata/app_folder/docs",
            params(&[("list", "true")]),
        );

        assert_eq!(
            url,
            "http://openapi.kuaipan.cn/1/metadata/app_folder/docs?list=true\
             &oauth_consumer_key=ck&oauth_nonce=42&oauth_signature_method=HMAC-SHA1\
             &oauth_timestamp=1349150400&oauth_token=tok&oauth_version=1.0\
             &oauth_signature=jOnrO65KnM3d%2F4Q1V2tTpJYTc%2F0%3D"
        );
    }

    #[test]
    fn signed_url_round_trips_through_server_side_derivation() {
        let credential = Credential::new("ck", "c s+cret").with_access("tok", "t/s");
        let signer = Signer::new();
        let uri = "http://openapi.kuaipan.cn/1/fileops/move";

        let url = signer.signed_url(
            &credential,
            "GET",
            uri,
            params(&[("from_path", "/a b/c.txt"), ("to_path", "/é+*")]),
        );

        let parsed = reqwest::Url::parse(&url).unwrap();
        let mut received: Params = parsed.query_pairs().into_owned().collect();
        let sent_signature = received.remove(OAUTH_SIGNATURE).unwrap();
        assert_eq!(received["from_path"], "/a b/c.txt");
        assert_eq!(received["to_path"], "/é+*");

        let derived = signature(&credential, "GET", uri, &received);
        assert_eq!(sent_signature, derived);
    }
}
