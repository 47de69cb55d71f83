//! Bearer token verification. Tokens are PASETO v4.public messages signed
//! with an Ed25519 key; the auth interceptor (see `dl_rpc::interceptors`)
//! rejects any call whose token doesn't verify or whose claims don't carry
//! a non-empty role, per spec §4.3.

use pasetors::claims::ClaimsValidationRules;
use pasetors::keys::{AsymmetricPublicKey, Version};
use pasetors::token::UntrustedToken;
use pasetors::{public, version4::V4};
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
	pub role: String,
	#[serde(default)]
	pub sub: Option<String>,
}

#[derive(Clone)]
pub struct TokenVerifier {
	public_key: AsymmetricPublicKey<V4>,
}

impl TokenVerifier {
	pub fn from_public_key_bytes(raw: &[u8]) -> Result<Self, Error> {
		let public_key = AsymmetricPublicKey::from(raw, Version::V4)
			.map_err(|e| Error::Message(format!("invalid PASETO public key: {}", e)))?;
		Ok(Self { public_key })
	}

	/// Verify a raw bearer token string, returning the decoded claims if
	/// the signature is valid and a non-empty `role` claim is present.
	pub fn verify(&self, token: &str) -> Result<Claims, Error> {
		let untrusted = UntrustedToken::<pasetors::Public, V4>::try_from(token)
			.map_err(|e| Error::Message(format!("malformed token: {}", e)))?;
		let rules = ClaimsValidationRules::new();
		let trusted = public::verify(&self.public_key, &untrusted, &rules, None, None).map_err(|e| {
			debug!("Rejected bearer token: signature invalid ({})", e);
			Error::Message(format!("token signature invalid: {}", e))
		})?;

		let payload = trusted.payload_claims().ok_or_else(|| {
			Error::Message("token carries no claims".to_string())
		})?;
		let json = serde_json::to_value(payload)
			.map_err(|e| Error::Message(format!("malformed claims: {}", e)))?;
		let claims: Claims = serde_json::from_value(json)
			.map_err(|_| Error::Message("token missing required claims".to_string()))?;

		if claims.role.is_empty() {
			return Err(Error::Message("token carries an empty role".to_string()));
		}

		Ok(claims)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pasetors::keys::{AsymmetricKeyPair, Generate};
	use pasetors::version4::V4;

	#[test]
	fn rejects_malformed_token() {
		let kp = AsymmetricKeyPair::<V4>::generate().unwrap();
		let verifier = TokenVerifier::from_public_key_bytes(kp.public.as_bytes()).unwrap();
		assert!(verifier.verify("not-a-token").is_err());
	}
}
