//! Interface listing.

use std::path::Path;

use photon_relay_core::capture::{list_interfaces, InterfaceFilter};
use photon_relay_core::config;

use crate::cli::InterfacesArgs;
use crate::error::Result;
use crate::output::{get_formatter, InterfaceRow};

/// Run the interfaces command
pub async fn run_interfaces(
    args: InterfacesArgs,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let formatter = get_formatter(json);
    let (config, _) = config::load_or_default(config_path).await?;
    let filter = InterfaceFilter::from_config(&config)?;

    let rows: Vec<InterfaceRow> = list_interfaces()?
        .into_iter()
        .map(|info| {
            let monitored = filter.accepts(&info);
            InterfaceRow { info, monitored }
        })
        .filter(|row| args.all || row.monitored)
        .collect();

    println!("{}", formatter.format_interfaces(&rows));
    Ok(())
}
