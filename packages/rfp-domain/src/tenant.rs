use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Identifier of one customer company, the unit of data isolation.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);
impl TenantId {
	pub fn new(raw: impl Into<String>) -> Result<Self> {
		let raw = raw.into();
		let trimmed = raw.trim();

		if trimmed.is_empty() {
			return Err(Error::InvalidTenant { message: "tenant_id must be non-empty.".to_string() });
		}
		if trimmed.len() != raw.len() {
			return Ok(Self(trimmed.to_string()));
		}

		Ok(Self(raw))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl fmt::Display for TenantId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
impl AsRef<str> for TenantId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl<'de> Deserialize<'de> for TenantId {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Self::new(raw).map_err(serde::de::Error::custom)
	}
}
