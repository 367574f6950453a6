use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use super::{ApplicationRepository, RepositoryError};
use crate::engine::directory::Directory;
use crate::engine::schedule::due_date;
use crate::engine::domain::{
    Agent, AgentId, Application, ApplicationId, Fillial, FillialId, Merchant, MerchantId,
};

/// Failure while loading a dataset from JSON or CSV exports.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid dataset JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid directory CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("agent {agent} lists invalid fillial id '{value}'")]
    InvalidFillialList { agent: u64, value: String },
    #[error("application {0} appears more than once")]
    DuplicateApplication(u64),
    #[error("application {application} has a negative {field}")]
    NegativeAmount {
        application: u64,
        field: &'static str,
    },
    #[error("application {application} has a term of {months} months, beyond the supported calendar")]
    UnsupportedTerm { application: u64, months: u32 },
}

/// In-memory snapshot of applications plus the directories needed to interpret them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub fillials: Vec<Fillial>,
    #[serde(default)]
    pub merchants: Vec<Merchant>,
    #[serde(default)]
    pub agents: Vec<Agent>,
}

impl Dataset {
    /// Load a dataset from a single JSON document, or from a folder containing
    /// `applications.json` and optional `fillials.csv`, `merchants.csv` and `agents.csv`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let dataset = if path.is_dir() {
            let file = File::open(path.join("applications.json"))?;
            let applications: Vec<Application> = serde_json::from_reader(BufReader::new(file))?;
            let mut dataset = Dataset {
                applications,
                ..Dataset::default()
            };

            if let Some(file) = open_optional(&path.join("fillials.csv"))? {
                dataset.fillials = parse_fillials(file)?;
            }
            if let Some(file) = open_optional(&path.join("merchants.csv"))? {
                dataset.merchants = parse_merchants(file)?;
            }
            if let Some(file) = open_optional(&path.join("agents.csv"))? {
                dataset.agents = parse_agents(file)?;
            }

            dataset.validated()?
        } else {
            Self::from_json_reader(BufReader::new(File::open(path)?))?
        };

        info!(
            path = %path.display(),
            applications = dataset.applications.len(),
            fillials = dataset.fillials.len(),
            agents = dataset.agents.len(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let dataset: Dataset = serde_json::from_reader(reader)?;
        dataset.validated()
    }

    /// Replace the directories with records parsed from CSV exports.
    pub fn with_directory_csv<F, M, A>(
        mut self,
        fillials: F,
        merchants: M,
        agents: A,
    ) -> Result<Self, DatasetError>
    where
        F: Read,
        M: Read,
        A: Read,
    {
        self.fillials = parse_fillials(fillials)?;
        self.merchants = parse_merchants(merchants)?;
        self.agents = parse_agents(agents)?;
        Ok(self)
    }

    pub fn build_directory(&self) -> Directory {
        Directory::new(
            self.fillials.iter().cloned(),
            self.merchants.iter().cloned(),
            self.agents.iter().cloned(),
        )
    }

    fn validated(self) -> Result<Self, DatasetError> {
        let mut seen = HashSet::new();
        for application in &self.applications {
            if !seen.insert(application.id) {
                return Err(DatasetError::DuplicateApplication(application.id.0));
            }
            check_reconcilable(application)?;
        }
        Ok(self)
    }
}

/// Stored records must always reconcile, so portfolio queries never fail on repository data.
fn check_reconcilable(application: &Application) -> Result<(), DatasetError> {
    let negative = |field| DatasetError::NegativeAmount {
        application: application.id.0,
        field,
    };

    if application.amount.is_some_and(|amount| amount < 0) {
        return Err(negative("amount"));
    }
    if application.payment_amount.is_some_and(|amount| amount < 0) {
        return Err(negative("payment_amount"));
    }
    if application.payments.iter().any(|payment| payment.amount < 0) {
        return Err(negative("payments.amount"));
    }
    if let Some(months) = application.term_months {
        if due_date(application.created_on(), months).is_none() {
            return Err(DatasetError::UnsupportedTerm {
                application: application.id.0,
                months,
            });
        }
    }
    Ok(())
}

impl ApplicationRepository for Dataset {
    fn list(&self) -> Result<Vec<Application>, RepositoryError> {
        Ok(self.applications.clone())
    }

    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self
            .applications
            .iter()
            .find(|application| application.id == id)
            .cloned())
    }

    fn directory(&self) -> Result<Directory, RepositoryError> {
        Ok(self.build_directory())
    }
}

fn open_optional(path: &Path) -> Result<Option<File>, std::io::Error> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "optional directory file missing");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

#[derive(Debug, Deserialize)]
struct FillialRow {
    id: u64,
    region: String,
    merchant_id: u64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MerchantRow {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AgentRow {
    id: u64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    name: Option<String>,
    #[serde(default)]
    fillial_ids: String,
}

fn parse_fillials<R: Read>(reader: R) -> Result<Vec<Fillial>, DatasetError> {
    let mut fillials = Vec::new();
    for row in csv_reader(reader).deserialize::<FillialRow>() {
        let row = row?;
        fillials.push(Fillial {
            id: FillialId(row.id),
            region: row.region,
            merchant_id: MerchantId(row.merchant_id),
            name: row.name,
        });
    }
    Ok(fillials)
}

fn parse_merchants<R: Read>(reader: R) -> Result<Vec<Merchant>, DatasetError> {
    let mut merchants = Vec::new();
    for row in csv_reader(reader).deserialize::<MerchantRow>() {
        let row = row?;
        merchants.push(Merchant {
            id: MerchantId(row.id),
            name: row.name,
        });
    }
    Ok(merchants)
}

fn parse_agents<R: Read>(reader: R) -> Result<Vec<Agent>, DatasetError> {
    let mut agents = Vec::new();
    for row in csv_reader(reader).deserialize::<AgentRow>() {
        let row = row?;
        let mut fillial_ids = BTreeSet::new();
        for value in row
            .fillial_ids
            .split(';')
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            let id = value
                .parse::<u64>()
                .map_err(|_| DatasetError::InvalidFillialList {
                    agent: row.id,
                    value: value.to_string(),
                })?;
            fillial_ids.insert(FillialId(id));
        }

        agents.push(Agent {
            id: AgentId(row.id),
            name: row.name,
            fillial_ids,
        });
    }
    Ok(agents)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DOCUMENT: &str = r#"{
        "applications": [
            {
                "id": 1,
                "raw_status": "ACTIVE",
                "amount": 1200000,
                "term_months": 6,
                "created_at": "2024-02-01T09:15:00.000Z",
                "fillial_id": 3,
                "paid": true,
                "payment_method": "CARD",
                "payments": [
                    { "amount": 200000, "occurred_at": "2024-03-01T10:00:00Z", "status": "SUCCESS" }
                ]
            },
            {
                "id": 2,
                "raw_status": "NEW",
                "created_at": "2024-02-03",
                "fillial_id": 4
            }
        ],
        "fillials": [ { "id": 3, "region": "Tashkent", "merchant_id": 9 } ],
        "merchants": [ { "id": 9, "name": "Artel" } ],
        "agents": [ { "id": 5, "fillial_ids": [3, 4] } ]
    }"#;

    #[test]
    fn loads_json_document() {
        let dataset = Dataset::from_json_reader(Cursor::new(DOCUMENT)).expect("dataset parses");
        assert_eq!(dataset.applications.len(), 2);
        assert_eq!(dataset.applications[0].payments.len(), 1);
        assert_eq!(dataset.applications[1].amount, None);

        let directory = dataset.build_directory();
        assert_eq!(directory.merchant_of(FillialId(3)), Some(MerchantId(9)));
        let agent = directory.agent(AgentId(5)).expect("agent present");
        assert!(agent.fillial_ids.contains(&FillialId(4)));

        let fetched = dataset.fetch(ApplicationId(2)).expect("fetch works");
        assert_eq!(fetched.map(|application| application.raw_status), Some("NEW".to_string()));
    }

    #[test]
    fn rejects_duplicate_application_ids() {
        let document = r#"{ "applications": [
            { "id": 1, "raw_status": "NEW", "created_at": "2024-01-01", "fillial_id": 1 },
            { "id": 1, "raw_status": "NEW", "created_at": "2024-01-02", "fillial_id": 1 }
        ] }"#;
        let err = Dataset::from_json_reader(Cursor::new(document)).expect_err("duplicate ids");
        assert!(matches!(err, DatasetError::DuplicateApplication(1)));
    }

    #[test]
    fn rejects_negative_amounts_at_load() {
        let document = r#"{ "applications": [
            { "id": 1, "raw_status": "ACTIVE", "amount": 100, "created_at": "2024-01-01", "fillial_id": 1 },
            { "id": 2, "raw_status": "ACTIVE", "amount": -5, "created_at": "2024-01-02", "fillial_id": 1 }
        ] }"#;
        let err = Dataset::from_json_reader(Cursor::new(document)).expect_err("negative amount");
        assert!(matches!(
            err,
            DatasetError::NegativeAmount {
                application: 2,
                field: "amount"
            }
        ));

        let document = r#"{ "applications": [
            { "id": 3, "raw_status": "FINISHED", "payment_amount": 900, "created_at": "2024-01-01",
              "fillial_id": 1, "payments": [ { "amount": -1, "occurred_at": "2024-02-01" } ] }
        ] }"#;
        let err = Dataset::from_json_reader(Cursor::new(document)).expect_err("negative payment");
        assert!(matches!(
            err,
            DatasetError::NegativeAmount {
                application: 3,
                field: "payments.amount"
            }
        ));
    }

    #[test]
    fn rejects_terms_beyond_the_calendar() {
        let document = r#"{ "applications": [
            { "id": 4, "raw_status": "NEW", "term_months": 4294967295, "created_at": "2024-01-01", "fillial_id": 1 }
        ] }"#;
        let err = Dataset::from_json_reader(Cursor::new(document)).expect_err("huge term");
        assert!(matches!(
            err,
            DatasetError::UnsupportedTerm { application: 4, .. }
        ));
    }

    #[test]
    fn loaded_datasets_always_reconcile() {
        let dataset = Dataset::from_json_reader(Cursor::new(DOCUMENT)).expect("dataset parses");
        let as_of = chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("valid date");
        let overview = crate::engine::portfolio_overview(dataset.applications.iter(), as_of)
            .expect("stored applications reconcile");
        assert_eq!(overview.applications, 2);
    }

    #[test]
    fn parses_directory_csv_exports() {
        let fillials = "id,region,merchant_id,name\n1, Tashkent ,10,Chilonzor\n2,Samarkand,10,\n";
        let merchants = "id,name\n10,Texnomart\n";
        let agents = "id,name,fillial_ids\n7,Dilshod,1; 2\n8,,\n";

        let dataset = Dataset::default()
            .with_directory_csv(
                Cursor::new(fillials),
                Cursor::new(merchants),
                Cursor::new(agents),
            )
            .expect("csv parses");

        assert_eq!(dataset.fillials[0].region, "Tashkent");
        assert_eq!(dataset.fillials[1].name, None);
        assert_eq!(dataset.merchants[0].name, "Texnomart");
        assert_eq!(
            dataset.agents[0].fillial_ids,
            BTreeSet::from([FillialId(1), FillialId(2)])
        );
        assert!(dataset.agents[1].fillial_ids.is_empty());
        assert_eq!(dataset.agents[1].name, None);
    }

    #[test]
    fn rejects_malformed_agent_fillial_lists() {
        let err = Dataset::default()
            .with_directory_csv(
                Cursor::new("id,region,merchant_id,name\n"),
                Cursor::new("id,name\n"),
                Cursor::new("id,name,fillial_ids\n7,Dilshod,1;x\n"),
            )
            .expect_err("invalid fillial id");
        assert!(matches!(
            err,
            DatasetError::InvalidFillialList { agent: 7, .. }
        ));
    }
}
