//! Enums persisted as TEXT columns.

/// Declares a fieldless enum whose variants map one-to-one onto lowercase
/// strings. The strings are used for JSON, query parameters and the TEXT
/// columns in Postgres.
#[macro_export]
macro_rules! text_enum {
	($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
		$vis enum $name {
			$(#[serde(rename = $text)] $variant),+
		}

		impl $name {
			pub fn as_str(&self) -> &'static str {
				match self {
					$($name::$variant => $text),+
				}
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(self.as_str())
			}
		}

		impl std::str::FromStr for $name {
			type Err = $crate::error::AppError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				match s {
					$($text => Ok($name::$variant),)+
					other => Err($crate::error::AppError::BadRequest(format!(
						"unknown {} `{}`",
						stringify!($name),
						other
					))),
				}
			}
		}

		impl tokio_postgres::types::ToSql for $name {
			fn to_sql(
				&self,
				ty: &tokio_postgres::types::Type,
				out: &mut bytes::BytesMut,
			) -> Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
				<&str as tokio_postgres::types::ToSql>::to_sql(&self.as_str(), ty, out)
			}

			fn accepts(ty: &tokio_postgres::types::Type) -> bool {
				<&str as tokio_postgres::types::ToSql>::accepts(ty)
			}

			fn to_sql_checked(
				&self,
				ty: &tokio_postgres::types::Type,
				out: &mut bytes::BytesMut,
			) -> Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
				<&str as tokio_postgres::types::ToSql>::to_sql_checked(&self.as_str(), ty, out)
			}
		}

		impl<'a> tokio_postgres::types::FromSql<'a> for $name {
			fn from_sql(
				ty: &tokio_postgres::types::Type,
				raw: &'a [u8],
			) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
				let text = <&str as tokio_postgres::types::FromSql>::from_sql(ty, raw)?;
				Ok(text.parse::<$name>()?)
			}

			fn accepts(ty: &tokio_postgres::types::Type) -> bool {
				<&str as tokio_postgres::types::FromSql>::accepts(ty)
			}
		}
	};
}
