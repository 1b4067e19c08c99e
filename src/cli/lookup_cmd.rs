//! `dcmr lookup` — zoning and historic-district attributes for an address.

use crate::cli::output::{self, Styled};
use crate::geo::GeoClient;
use anyhow::{bail, Result};

/// Run the lookup command.
pub async fn run(address: &str) -> Result<()> {
    let s = Styled::new();
    let client = GeoClient::new();

    let Some(attrs) = client.lookup(address).await? else {
        bail!("failed to geocode address: {address}");
    };

    if output::is_json() {
        output::print_json(&serde_json::to_value(&attrs)?);
    } else if !output::is_quiet() {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "Not Available".to_string());
        eprintln!("  {} {address}", s.ok_sym());
        eprintln!("    Zone District:     {}", show(&attrs.zone_district));
        eprintln!("    Zoning Label:      {}", show(&attrs.zoning_label));
        eprintln!(
            "    Historic District: {}",
            attrs
                .historic_district
                .clone()
                .unwrap_or_else(|| "No Historic District".to_string())
        );
    }
    Ok(())
}
