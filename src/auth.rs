use std::future::{ready, Ready};
use std::num::ParseIntError;

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::Error;
use crate::schemas::MemberId;

type HmacSha256 = Hmac<Sha256>;

/// The member a request was signed for.
///
/// Requests carry `Authorization: <member id>:<hex signature>`, where the
/// signature is an HMAC-SHA256 of the member id keyed with the SHA-256 hash
/// of the shared auth secret.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedMember(pub MemberId);

impl FromRequest for AuthenticatedMember {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(request: &HttpRequest, _: &mut Payload) -> Self::Future {
        let Some(config) = request.app_data::<web::Data<Config>>() else {
            tracing::error!("No config registered, rejecting request");
            return ready(Err(Error::Unauthorized));
        };
        let authorization = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let result = match authorization {
            Some(authorization) => check_authorization(authorization, &config.auth_secret),
            None => Err(Error::Unauthorized),
        };
        if result.is_err() {
            tracing::debug!("Rejected request to {} without valid credentials", request.path());
        }
        ready(result.map(AuthenticatedMember))
    }
}

pub fn check_authorization(authorization: &str, secret: &str) -> Result<MemberId, Error> {
    let (member_id, signature) = authorization
        .rsplit_once(':')
        .ok_or(Error::Unauthorized)?;
    if member_id.is_empty() {
        return Err(Error::Unauthorized);
    }
    let signature = decode_hex(signature).map_err(|_| Error::Unauthorized)?;

    signer(secret)
        .chain_update(member_id.as_bytes())
        .verify_slice(&signature)
        .map_err(|_| Error::Unauthorized)?;
    Ok(member_id.to_string())
}

/// Builds the `Authorization` header value for a member.
pub fn sign_member_id(member_id: &str, secret: &str) -> String {
    let signature = signer(secret)
        .chain_update(member_id.as_bytes())
        .finalize()
        .into_bytes()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    format!("{member_id}:{signature}")
}

fn signer(secret: &str) -> HmacSha256 {
    let mut sha256_hasher = Sha256::new();
    sha256_hasher.update(secret.as_bytes());
    let secret_hash = sha256_hasher.finalize();

    HmacSha256::new_from_slice(&secret_hash).unwrap()
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, ParseIntError> {
    hex.as_bytes()
        .chunks(2)
        .map(|pair| u8::from_str_radix(&String::from_utf8_lossy(pair), 16))
        .collect()
}
