//! Punchcard Admin CLI

use std::process;

use clap::{Args, Parser, Subcommand};
use jiff::Timestamp;
use punchcard::{
    context::AppContext,
    domain::campaigns::{
        data::{NewCampaign, Page},
        records::{CampaignId, CampaignRecord, Discount},
    },
};

#[derive(Debug, Parser)]
#[command(name = "punchcard", about = "Punchcard CLI", long_about = None)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Campaign(CampaignCommand),
}

#[derive(Debug, Args)]
struct CampaignCommand {
    #[command(subcommand)]
    command: CampaignSubcommand,
}

#[derive(Debug, Subcommand)]
enum CampaignSubcommand {
    Create(CreateCampaignArgs),
    Activate(CampaignIdArgs),
    Deactivate(CampaignIdArgs),
    Delete(CampaignIdArgs),
    List(ListCampaignArgs),
}

#[derive(Debug, Args)]
struct CreateCampaignArgs {
    /// Human-readable campaign code, unique and immutable
    #[arg(long)]
    code: String,

    /// Campaign display name
    #[arg(long)]
    name: String,

    /// Optional description
    #[arg(long)]
    description: Option<String>,

    /// Start of the validity window (RFC 3339)
    #[arg(long, value_parser = parse_timestamp)]
    starts: Timestamp,

    /// End of the validity window (RFC 3339)
    #[arg(long, value_parser = parse_timestamp)]
    ends: Timestamp,

    #[command(flatten)]
    discount: DiscountArgs,

    /// Minimum purchase total required, in minor currency units
    #[arg(long)]
    min_purchase: Option<u64>,

    /// Issuance cap; omit for unlimited
    #[arg(long)]
    max_issuance: Option<u32>,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct DiscountArgs {
    /// Fixed amount off, in minor currency units
    #[arg(long)]
    amount_off: Option<u64>,

    /// Percentage off the purchase, 1-100
    #[arg(long)]
    percent_off: Option<u16>,

    /// Waive the delivery fee
    #[arg(long)]
    free_delivery: bool,
}

impl DiscountArgs {
    fn to_discount(&self) -> Discount {
        if let Some(amount) = self.amount_off {
            Discount::FixedAmount { amount }
        } else if let Some(rate) = self.percent_off {
            Discount::Percentage { rate }
        } else {
            Discount::FreeDelivery
        }
    }
}

#[derive(Debug, Args)]
struct CampaignIdArgs {
    /// Campaign id
    #[arg(long)]
    id: i64,
}

#[derive(Debug, Args)]
struct ListCampaignArgs {
    /// Page size
    #[arg(long, default_value_t = 10)]
    limit: u32,

    /// Page offset
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

fn parse_timestamp(value: &str) -> Result<Timestamp, jiff::Error> {
    value.parse()
}

#[tokio::main]
pub async fn main() {
    let _env = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(error) = run(cli).await {
        eprintln!("{error}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let database_url = cli
        .database_url
        .ok_or_else(|| "DATABASE_URL is not set".to_string())?;

    let ctx = AppContext::from_database_url(&database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    match cli.command {
        Commands::Campaign(CampaignCommand { command }) => match command {
            CampaignSubcommand::Create(args) => create_campaign(&ctx, args).await,
            CampaignSubcommand::Activate(args) => {
                let campaign = ctx
                    .campaigns
                    .activate_campaign(CampaignId::from_i64(args.id))
                    .await
                    .map_err(|error| format!("failed to activate campaign: {error}"))?;

                print_campaign(&campaign);
                Ok(())
            }
            CampaignSubcommand::Deactivate(args) => {
                let campaign = ctx
                    .campaigns
                    .deactivate_campaign(CampaignId::from_i64(args.id))
                    .await
                    .map_err(|error| format!("failed to deactivate campaign: {error}"))?;

                print_campaign(&campaign);
                Ok(())
            }
            CampaignSubcommand::Delete(args) => {
                let action = ctx
                    .campaigns
                    .delete_campaign(CampaignId::from_i64(args.id))
                    .await
                    .map_err(|error| format!("failed to delete campaign: {error}"))?;

                println!("action: {action:?}");
                Ok(())
            }
            CampaignSubcommand::List(args) => {
                let campaigns = ctx
                    .campaigns
                    .list_campaigns(Page {
                        limit: args.limit,
                        offset: args.offset,
                    })
                    .await
                    .map_err(|error| format!("failed to list campaigns: {error}"))?;

                for campaign in &campaigns {
                    print_campaign(campaign);
                    println!();
                }

                Ok(())
            }
        },
    }
}

async fn create_campaign(ctx: &AppContext, args: CreateCampaignArgs) -> Result<(), String> {
    let campaign = ctx
        .campaigns
        .create_campaign(NewCampaign {
            code: args.code,
            name: args.name,
            description: args.description,
            discount: args.discount.to_discount(),
            minimum_purchase: args.min_purchase,
            start_date: args.starts,
            end_date: args.ends,
            max_issuance: args.max_issuance,
        })
        .await
        .map_err(|error| format!("failed to create campaign: {error}"))?;

    print_campaign(&campaign);

    Ok(())
}

fn print_campaign(campaign: &CampaignRecord) {
    println!("campaign_id: {}", campaign.id);
    println!("code: {}", campaign.code);
    println!("name: {}", campaign.name);
    println!("status: {}", campaign.status.as_str());
    println!("window: {} .. {}", campaign.start_date, campaign.end_date);

    match campaign.max_issuance {
        Some(cap) => println!("issued: {} / {cap}", campaign.issued_count),
        None => println!("issued: {} / unlimited", campaign.issued_count),
    }
}
