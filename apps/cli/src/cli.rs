use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rabbit_core::RabbitColor;

/// Split a restaurant bill between friends, item by item.
#[derive(Parser)]
#[command(
    name = "rabbit",
    version = env!("CARGO_PKG_VERSION"),
    about = "Split a bill item by item and share the result as a link",
    long_about = None
)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(global = true, long = "config")]
    pub config: Option<PathBuf>,

    /// Override the SQLite database path
    #[arg(global = true, long = "db")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new, empty tab
    New {
        name: String,

        #[arg(long, default_value = "USD")]
        currency: String,

        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        tax: f64,

        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        tip: f64,
    },

    /// List recent tabs
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Print a tab and what everyone owes
    Show { tab: String },

    /// Add an item; the price is read in the tab's currency ("12.50", "$1,200")
    AddItem {
        tab: String,
        description: String,
        price: String,
    },

    /// Add a rabbit (a person splitting the bill)
    AddRabbit {
        tab: String,
        name: String,

        /// Defaults to the first colour not yet used on the tab
        #[arg(long, value_enum)]
        color: Option<ColorArg>,
    },

    /// Toggle whether a rabbit shares an item
    Assign {
        tab: String,
        item: String,
        rabbit: String,
    },

    /// Set the tax and tip percentages
    Rates {
        tab: String,

        #[arg(long, allow_negative_numbers = true)]
        tax: Option<f64>,

        #[arg(long, allow_negative_numbers = true)]
        tip: Option<f64>,
    },

    /// Print a share link for a tab
    Share {
        tab: String,

        /// Store the bill server-side behind a short token instead of packing it into the link
        #[arg(long)]
        remote: bool,
    },

    /// Resolve a share link or token and print the bill
    Open {
        link: String,

        /// Print the bill as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read a receipt scan response and optionally add its items to a tab
    Scan {
        file: PathBuf,

        #[arg(long)]
        tab: Option<String>,
    },

    /// Run an in-memory walkthrough of an edit session
    Demo,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorArg {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
}

impl From<ColorArg> for RabbitColor {
    fn from(color: ColorArg) -> Self {
        match color {
            ColorArg::Red => RabbitColor::Red,
            ColorArg::Orange => RabbitColor::Orange,
            ColorArg::Yellow => RabbitColor::Yellow,
            ColorArg::Green => RabbitColor::Green,
            ColorArg::Blue => RabbitColor::Blue,
            ColorArg::Purple => RabbitColor::Purple,
        }
    }
}
