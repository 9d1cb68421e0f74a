// This file is part of the terraform-provider-huaweicloud project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Request authentication
//!
//! AK/SK credentials sign every request with `SDK-HMAC-SHA256`: the canonical form of the
//! request is hashed, the hash is signed with the secret key, and the result is sent in the
//! `Authorization` header along with the list of signed headers.

use std::fmt;

use hmac::{Hmac, Mac};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, HOST};
use reqwest::Request;
use sha2::{Digest, Sha256};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::{ApiError, Result};

pub const ALGORITHM: &str = "SDK-HMAC-SHA256";
pub const HEADER_SDK_DATE: &str = "X-Sdk-Date";
pub const HEADER_SECURITY_TOKEN: &str = "X-Security-Token";
pub const HEADER_AUTH_TOKEN: &str = "X-Auth-Token";

const SDK_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second]Z");

/// RFC 3986 unreserved characters are the only ones left as is
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    AkSk {
        access_key: String,
        secret_key: String,
        security_token: Option<String>,
    },
    Token(String),
}

impl Credentials {
    pub fn is_aksk(&self) -> bool {
        matches!(self, Self::AkSk { .. })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AkSk {
                access_key,
                security_token,
                ..
            } => f
                .debug_struct("AkSk")
                .field("access_key", access_key)
                .field("secret_key", &"<redacted>")
                .field(
                    "security_token",
                    &security_token.as_ref().map(|_| "<redacted>"),
                )
                .finish(),
            Self::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

/// Add the authentication headers to a fully built request
pub fn sign(credentials: &Credentials, request: &mut Request, now: OffsetDateTime) -> Result<()> {
    let (access_key, secret_key, security_token) = match credentials {
        Credentials::Token(token) => {
            request
                .headers_mut()
                .insert(HEADER_AUTH_TOKEN, header_value(token)?);
            return Ok(());
        }
        Credentials::AkSk {
            access_key,
            secret_key,
            security_token,
        } => (access_key, secret_key, security_token),
    };

    let date = now
        .format(SDK_DATE_FORMAT)
        .map_err(|err| ApiError::client(format!("unable to format the signing date: {err}")))?;

    let host = match (request.url().host_str(), request.url().port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_owned(),
        (None, _) => return Err(ApiError::client("cannot sign a request without host")),
    };

    let headers = request.headers_mut();
    headers.insert(HOST, header_value(&host)?);
    headers.insert(HEADER_SDK_DATE, header_value(&date)?);
    if let Some(token) = security_token {
        headers.insert(HEADER_SECURITY_TOKEN, header_value(token)?);
    }

    let signed_headers = signed_headers(request);
    let canonical = canonical_request(request, &signed_headers);
    let string_to_sign = format!(
        "{ALGORITHM}\n{date}\n{:x}",
        Sha256::digest(canonical.as_bytes())
    );

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|err| ApiError::client(format!("invalid secret key: {err}")))?;
    mac.update(string_to_sign.as_bytes());
    let signature = format!("{:x}", mac.finalize().into_bytes());

    let authorization = format!(
        "{ALGORITHM} Access={access_key}, SignedHeaders={}, Signature={signature}",
        signed_headers.join(";")
    );
    request
        .headers_mut()
        .insert(AUTHORIZATION, header_value(&authorization)?);

    Ok(())
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|err| ApiError::client(format!("invalid header value: {err}")))
}

/// Lowercase names of every header present on the request, sorted
fn signed_headers(request: &Request) -> Vec<String> {
    let mut names = request
        .headers()
        .keys()
        .map(HeaderName::as_str)
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>();
    names.sort();
    names.dedup();
    names
}

fn canonical_request(request: &Request, signed_headers: &[String]) -> String {
    let headers = request.headers();
    let canonical_headers = signed_headers
        .iter()
        .map(|name| {
            let value = headers
                .get_all(name.as_str())
                .iter()
                .filter_map(|value| value.to_str().ok())
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(",");
            format!("{name}:{value}\n")
        })
        .collect::<String>();

    let body = request
        .body()
        .and_then(reqwest::Body::as_bytes)
        .unwrap_or_default();

    format!(
        "{}\n{}\n{}\n{}\n{}\n{:x}",
        request.method().as_str(),
        canonical_uri(request.url().path()),
        canonical_query(request.url().query().unwrap_or_default()),
        canonical_headers,
        signed_headers.join(";"),
        Sha256::digest(body),
    )
}

fn escape(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

fn unescape(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Escaped path, always terminated by a slash
fn canonical_uri(path: &str) -> String {
    let mut uri = path
        .split('/')
        .map(|segment| escape(&unescape(segment)))
        .collect::<Vec<_>>()
        .join("/");
    if !uri.ends_with('/') {
        uri.push('/');
    }
    uri
}

fn canonical_query(query: &str) -> String {
    let mut pairs = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                escape(&unescape(&key.replace('+', " "))),
                escape(&unescape(&value.replace('+', " "))),
            )
        })
        .collect::<Vec<_>>();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use time::macros::datetime;

    use super::*;

    fn request(method: Method, url: &str, body: &'static str) -> Request {
        let mut request = Request::new(method, url.parse().unwrap());
        request
            .headers_mut()
            .insert("content-type", HeaderValue::from_static("application/json"));
        if !body.is_empty() {
            *request.body_mut() = Some(body.into());
        }
        request
    }

    fn aksk() -> Credentials {
        Credentials::AkSk {
            access_key: "AK".into(),
            secret_key: "SK".into(),
            security_token: None,
        }
    }

    #[test]
    fn uri_is_escaped_and_terminated() {
        assert_eq!(canonical_uri("/v1/abc/cae/environments"), "/v1/abc/cae/environments/");
        assert_eq!(canonical_uri("/v2/manage/namespaces/a%20b"), "/v2/manage/namespaces/a%20b/");
        assert_eq!(canonical_uri("/"), "/");
    }

    #[test]
    fn query_is_sorted() {
        assert_eq!(canonical_query("name=b&limit=10&id=a%2Fb"), "id=a%2Fb&limit=10&name=b");
        assert_eq!(canonical_query(""), "");
    }

    #[test]
    fn canonical_form() {
        let mut req = request(
            Method::POST,
            "https://cae.cn-north-4.myhuaweicloud.com/v1/p/cae/environments?limit=2",
            "{}",
        );
        req.headers_mut()
            .insert(HOST, HeaderValue::from_static("cae.cn-north-4.myhuaweicloud.com"));
        req.headers_mut()
            .insert(HEADER_SDK_DATE, HeaderValue::from_static("20240101T000000Z"));

        let signed = signed_headers(&req);
        assert_eq!(signed, vec!["content-type", "host", "x-sdk-date"]);

        let expected = format!(
            "POST\n/v1/p/cae/environments/\nlimit=2\n\
             content-type:application/json\n\
             host:cae.cn-north-4.myhuaweicloud.com\n\
             x-sdk-date:20240101T000000Z\n\n\
             content-type;host;x-sdk-date\n{:x}",
            Sha256::digest(b"{}")
        );
        assert_eq!(canonical_request(&req, &signed), expected);
    }

    #[test]
    fn aksk_signature() {
        let now = datetime!(2024-01-01 0:00 UTC);
        let mut req = request(
            Method::GET,
            "http://127.0.0.1:8080/v1/p/cae/environments",
            "",
        );
        sign(&aksk(), &mut req, now).unwrap();

        let headers = req.headers();
        assert_eq!(headers[HEADER_SDK_DATE], "20240101T000000Z");
        assert_eq!(headers[HOST], "127.0.0.1:8080");

        let authorization = headers[AUTHORIZATION].to_str().unwrap();
        let prefix = "SDK-HMAC-SHA256 Access=AK, SignedHeaders=content-type;host;x-sdk-date, Signature=";
        assert!(authorization.starts_with(prefix), "{authorization}");
        let signature = &authorization[prefix.len()..];
        assert_eq!(signature.len(), 64);

        // same input, same signature
        let mut again = request(
            Method::GET,
            "http://127.0.0.1:8080/v1/p/cae/environments",
            "",
        );
        sign(&aksk(), &mut again, now).unwrap();
        assert_eq!(again.headers()[AUTHORIZATION], headers[AUTHORIZATION]);
    }

    #[test]
    fn security_token_is_signed() {
        let credentials = Credentials::AkSk {
            access_key: "AK".into(),
            secret_key: "SK".into(),
            security_token: Some("STS".into()),
        };
        let mut req = request(Method::DELETE, "https://iam.myhuaweicloud.com/v3/projects", "");
        sign(&credentials, &mut req, datetime!(2024-06-30 12:34:56 UTC)).unwrap();

        assert_eq!(req.headers()[HEADER_SECURITY_TOKEN], "STS");
        let authorization = req.headers()[AUTHORIZATION].to_str().unwrap();
        assert!(authorization.contains("SignedHeaders=content-type;host;x-sdk-date;x-security-token,"));
    }

    #[test]
    fn token_credentials() {
        let mut req = request(Method::GET, "https://iam.myhuaweicloud.com/v3/projects", "");
        sign(&Credentials::Token("tok".into()), &mut req, OffsetDateTime::UNIX_EPOCH).unwrap();

        assert_eq!(req.headers()[HEADER_AUTH_TOKEN], "tok");
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", aksk());
        assert!(!debug.contains("\"SK\""));
        assert!(debug.contains("<redacted>"));
    }
}
