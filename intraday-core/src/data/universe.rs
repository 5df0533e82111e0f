//! Universe of symbols: a company table filtered by sector or market cap.
//!
//! The table is a CSV export with a header row and at least these leading
//! columns, in order: symbol, name, last sale, market cap, IPO year, sector,
//! industry. Extra trailing columns are ignored.

use super::provider::DataError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

const COL_SYMBOL: usize = 0;
const COL_NAME: usize = 1;
const COL_MARKET_CAP: usize = 3;
const COL_SECTOR: usize = 5;
const COL_INDUSTRY: usize = 6;

/// One row of the company table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub symbol: String,
    pub name: String,
    /// Market cap as printed in the table, e.g. `$1.2B` or `$350M`.
    pub market_cap: String,
    pub sector: String,
    pub industry: String,
}

/// Which companies to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionRule {
    All,
    /// Exact sector match.
    Sector(String),
    /// Sector match, or a market cap string containing `suffix` (e.g. `"B"` for
    /// billion-dollar companies in any sector).
    SectorOrMarketCapSuffix { sector: String, suffix: String },
}

impl SelectionRule {
    pub fn matches(&self, company: &Company) -> bool {
        match self {
            SelectionRule::All => true,
            SelectionRule::Sector(sector) => company.sector == *sector,
            SelectionRule::SectorOrMarketCapSuffix { sector, suffix } => {
                company.sector == *sector || company.market_cap.contains(suffix.as_str())
            }
        }
    }
}

/// The loaded company table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Universe {
    companies: Vec<Company>,
}

impl Universe {
    /// Load a company table from a CSV file.
    pub fn from_company_csv(path: &Path) -> Result<Self, DataError> {
        let file = std::fs::File::open(path)
            .map_err(|e| DataError::Universe(format!("read {}: {e}", path.display())))?;
        Self::from_reader(file)
    }

    /// Parse a company table from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut companies = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| DataError::Universe(format!("row {}: {e}", i + 2)))?;
            let field = |col: usize| record.get(col).unwrap_or("").to_string();

            let symbol = field(COL_SYMBOL);
            if symbol.is_empty() {
                continue;
            }
            companies.push(Company {
                symbol,
                name: field(COL_NAME),
                market_cap: field(COL_MARKET_CAP),
                sector: field(COL_SECTOR),
                industry: field(COL_INDUSTRY),
            });
        }
        Ok(Self { companies })
    }

    /// A universe of bare symbols with no company metadata.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let companies = symbols
            .into_iter()
            .map(|s| Company {
                symbol: s.into().trim().to_uppercase(),
                name: String::new(),
                market_cap: String::new(),
                sector: String::new(),
                industry: String::new(),
            })
            .filter(|c| !c.symbol.is_empty())
            .collect();
        Self { companies }
    }

    pub fn companies(&self) -> &[Company] {
        &self.companies
    }

    /// Symbols matching `rule`, in table order, without duplicates.
    pub fn select(&self, rule: &SelectionRule) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut picked = Vec::new();
        for company in &self.companies {
            if rule.matches(company) && seen.insert(company.symbol.as_str()) {
                picked.push(company.symbol.clone());
            }
        }
        picked
    }

    pub fn ticker_count(&self) -> usize {
        self.companies.len()
    }
}
