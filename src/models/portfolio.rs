use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// A named grouping of investments. Names are not unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Portfolio {
    pub id: Uuid,
    pub name: String,
    pub date_created: DateTime<Utc>,
    pub version: i32,
}

/// A portfolio that has not been persisted yet. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPortfolio {
    pub name: String,
    pub date_created: DateTime<Utc>,
    pub version: i32,
}

impl NewPortfolio {
    /// Applies the creation defaults: `date_created = now` and `version = 1`.
    pub fn from_request(input: &CreatePortfolio, now: DateTime<Utc>) -> Self {
        Self {
            name: input.name.clone(),
            date_created: input.date_created.unwrap_or(now),
            version: input.version.unwrap_or(1),
        }
    }

    pub(crate) fn with_id(self, id: Uuid) -> Portfolio {
        Portfolio {
            id,
            name: self.name,
            date_created: self.date_created,
            version: self.version,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePortfolio {
    pub name: String,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<i32>,
}

impl CreatePortfolio {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date_created: None,
            version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePortfolio {
    pub name: String,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    /// The version the caller last read.
    pub version: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub portfolio_id: String,
    pub name: String,
    pub date_created: DateTime<Utc>,
    pub version: i32,
}

impl From<Portfolio> for PortfolioResponse {
    fn from(value: Portfolio) -> Self {
        Self {
            portfolio_id: value.id.to_string(),
            name: value.name,
            date_created: value.date_created,
            version: value.version,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteParams {
    pub version: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_portfolio_applies_defaults() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let doc = NewPortfolio::from_request(&CreatePortfolio::named("Growth"), now);

        assert_eq!(doc.name, "Growth");
        assert_eq!(doc.date_created, now);
        assert_eq!(doc.version, 1);
    }

    #[test]
    fn test_new_portfolio_keeps_supplied_values() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let created = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let input = CreatePortfolio {
            name: "Income".to_string(),
            date_created: Some(created),
            version: Some(5),
        };

        let doc = NewPortfolio::from_request(&input, now);
        assert_eq!(doc.date_created, created);
        assert_eq!(doc.version, 5);
    }

    #[test]
    fn test_create_request_uses_camel_case() {
        let input: CreatePortfolio = serde_json::from_str(
            r#"{"name": "Tech", "dateCreated": "2024-01-15T10:00:00Z", "version": 2}"#,
        )
        .unwrap();

        assert_eq!(input.name, "Tech");
        assert!(input.date_created.is_some());
        assert_eq!(input.version, Some(2));
    }

    #[test]
    fn test_response_serializes_portfolio_id() {
        let portfolio = Portfolio {
            id: Uuid::new_v4(),
            name: "Tech".to_string(),
            date_created: Utc::now(),
            version: 3,
        };
        let json = serde_json::to_value(PortfolioResponse::from(portfolio.clone())).unwrap();

        assert_eq!(json["portfolioId"], portfolio.id.to_string());
        assert_eq!(json["version"], 3);
        assert!(json.get("dateCreated").is_some());
    }
}
