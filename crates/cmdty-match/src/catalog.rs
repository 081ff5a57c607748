//! Descriptions for well-known vendor index tickers.
//!
//! Candidate labels are opaque to the matcher; this table only annotates the
//! diagnostic report so a reviewer can sanity-check accepted pairs.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Energy,
    Agriculture,
    Livestock,
    PreciousMetals,
    IndustrialMetals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstrumentInfo {
    pub ticker: &'static str,
    pub commodity: &'static str,
    pub sector: Sector,
}

const fn info(ticker: &'static str, commodity: &'static str, sector: Sector) -> InstrumentInfo {
    InstrumentInfo { ticker, commodity, sector }
}

/// S&P GSCI single-commodity excess return indices.
pub const GSCI_EXCESS_RETURN: &[InstrumentInfo] = &[
    info("SPGCBRP", "Brent Crude Oil", Sector::Energy),
    info("SPGCGOP", "Gasoil", Sector::Energy),
    info("SPGCCLP", "WTI Crude Oil", Sector::Energy),
    info("SPGCHUP", "Unleaded Gasoline", Sector::Energy),
    info("SPGCHOP", "Heating Oil", Sector::Energy),
    info("SPGCNGP", "Natural Gas", Sector::Energy),
    info("SPGCCTP", "Cotton", Sector::Agriculture),
    info("SPGCKCP", "Coffee", Sector::Agriculture),
    info("SPGCCCP", "Cocoa", Sector::Agriculture),
    info("SPGCSBP", "Sugar", Sector::Agriculture),
    info("SPGCSOP", "Soybeans", Sector::Agriculture),
    info("SPGCKWP", "Kansas Wheat", Sector::Agriculture),
    info("SPGCCNP", "Corn", Sector::Agriculture),
    info("SPGCWHP", "Wheat", Sector::Agriculture),
    info("SPGCLHP", "Lean Hogs", Sector::Livestock),
    info("SPGCFCP", "Feeder Cattle", Sector::Livestock),
    info("SPGCLCP", "Live Cattle", Sector::Livestock),
    info("SPGCGCP", "Gold", Sector::PreciousMetals),
    info("SPGCSIP", "Silver", Sector::PreciousMetals),
    info("SPGCIAP", "Aluminum", Sector::IndustrialMetals),
    info("SPGCIKP", "Nickel", Sector::IndustrialMetals),
    info("SPGCILP", "Lead", Sector::IndustrialMetals),
    info("SPGCIZP", "Zinc", Sector::IndustrialMetals),
    info("SPGCICP", "Copper", Sector::IndustrialMetals),
];

/// Looks up a label such as `SPGCCLP Index` or `SPGCCLP Index_PX_LAST`.
pub fn lookup(label: &str) -> Option<&'static InstrumentInfo> {
    let ticker = label.split(['_', ' ']).next()?.trim();
    GSCI_EXCESS_RETURN.iter().find(|entry| entry.ticker.eq_ignore_ascii_case(ticker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_strips_bloomberg_suffixes() {
        let entry = lookup("SPGCCLP Index_PX_LAST").expect("known ticker");
        assert_eq!(entry.commodity, "WTI Crude Oil");
        assert_eq!(entry.sector, Sector::Energy);
        assert!(lookup("CL1 Comdty").is_none());
    }
}
