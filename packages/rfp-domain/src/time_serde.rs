use serde::{Deserialize, Deserializer, Serializer};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match value {
		Some(ts) => {
			let formatted = ts.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

			serializer.serialize_some(&formatted)
		},
		None => serializer.serialize_none(),
	}
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<String>::deserialize(deserializer)?;

	raw.map(|value| OffsetDateTime::parse(&value, &Rfc3339).map_err(serde::de::Error::custom))
		.transpose()
}
