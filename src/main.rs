/// `swift-too` command-line front end
use anyhow::{anyhow, bail, Context};
use serde_json::Value;
use swift_too::domain::instrument::parse_mode;
use swift_too::domain::{DateRange, ObsId};
use swift_too::resources::{
    Data, Guano, ObsQuery, PlanQuery, Saa, Tle, Too, TooRequests, UvotMode, VisQuery,
};
use swift_too::services::{fetch, resolve_name};
use swift_too::{ApiClient, Resource};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const USAGE: &str = "usage: swift-too <command> [args]

commands:
  resolve NAME                   resolve a target name to RA/Dec
  visibility NAME BEGIN [DAYS]   visibility windows for a target
  plan NAME BEGIN [DAYS]         planned observations of a target
  afst TARGETID                  as-flown observations of a target id
  too ID                         show a TOO request
  requests [LIMIT]               most recent TOO requests
  guano [LIMIT]                  recent BAT data dumps
  uvot MODE                      filters of a UVOT mode (int or 0x hex)
  saa BEGIN [DAYS]               South Atlantic Anomaly passages
  tle                            latest two-line elements
  data OBSID [OUTDIR] [PATTERN]  download archive data for an observation";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let client = ApiClient::from_env()?;
    info!(url = %client.config().api_url, "Configuration loaded successfully");
    let credentials = client.config().credentials.clone();

    match command.as_str() {
        "resolve" => {
            let name = arg(&args, 1, "NAME")?;
            match resolve_name(&client, name).await? {
                Some((ra, dec)) => println!("{}: RA {:.5} Dec {:.5}", name, ra, dec),
                None => bail!("could not resolve {}", name),
            }
        }
        "visibility" => {
            let range = range_from(&args, 2)?;
            let mut query = VisQuery::for_name(arg(&args, 1, "NAME")?, range);
            fetch(&client, &mut query).await?;
            for window in query.windows() {
                println!(
                    "{}  {}  {:>6} s",
                    window.begin,
                    window.end,
                    window.length().num_seconds()
                );
            }
            report(&query)?;
        }
        "plan" => {
            let mut query = PlanQuery::during(range_from(&args, 2)?);
            query.name = Some(arg(&args, 1, "NAME")?.to_string());
            fetch(&client, &mut query).await?;
            for entry in &query.entries {
                println!(
                    "{}  {}  {}  {}",
                    entry.begin,
                    entry.end,
                    entry.obsid(),
                    entry.target_name.as_deref().unwrap_or("")
                );
            }
            report(&query)?;
        }
        "afst" => {
            let targetid: u32 = arg(&args, 1, "TARGETID")?
                .parse()
                .context("TARGETID must be an integer")?;
            let mut query = ObsQuery::for_target(targetid);
            fetch(&client, &mut query).await?;
            for obs in query.observations() {
                println!(
                    "{}  {:>6} s  {}",
                    obs.obsid,
                    obs.exposure().num_seconds(),
                    obs.target_name().unwrap_or("")
                );
            }
            report(&query)?;
        }
        "too" => {
            let id: i64 = arg(&args, 1, "ID")?.parse().context("ID must be an integer")?;
            let mut too = Too::by_id(id, credentials);
            client.get(&mut too).await?;
            println!("{}", too.request);
            report(&too)?;
        }
        "requests" => {
            let mut requests = TooRequests::latest(limit(&args, 10)?);
            requests.credentials = credentials;
            fetch(&client, &mut requests).await?;
            for request in &requests.entries {
                println!("{}", request);
            }
            report(&requests)?;
        }
        "guano" => {
            let mut guano = Guano::latest(limit(&args, 5)?);
            guano.credentials = credentials;
            fetch(&client, &mut guano).await?;
            for entry in &guano.entries {
                println!(
                    "{}  {}  uplinked={} executed={}",
                    entry.target_time.map(|t| t.to_string()).unwrap_or_default(),
                    entry.target_type.as_deref().unwrap_or(""),
                    entry.is_uplinked(),
                    entry.is_executed()
                );
            }
            report(&guano)?;
        }
        "uvot" => {
            let raw = arg(&args, 1, "MODE")?;
            let mode = parse_mode(&Value::String(raw.to_string()))
                .ok_or_else(|| anyhow!("invalid UVOT mode {}", raw))?;
            let mut uvot = UvotMode::new(mode);
            fetch(&client, &mut uvot).await?;
            println!("{}", uvot);
            report(&uvot)?;
        }
        "saa" => {
            let mut saa = Saa::new(range_from(&args, 1)?);
            fetch(&client, &mut saa).await?;
            for entry in &saa.entries {
                println!("{}  {}", entry.begin, entry.end);
            }
            report(&saa)?;
        }
        "tle" => {
            let mut tle = Tle::latest();
            fetch(&client, &mut tle).await?;
            if let Some(entry) = &tle.tle {
                println!("{}\n{}", entry.tle1, entry.tle2);
            }
            report(&tle)?;
        }
        "data" => {
            let obsid: ObsId = arg(&args, 1, "OBSID")?
                .parse()
                .map_err(|e: String| anyhow!(e))?;
            let mut data = Data::new(obsid);
            data.credentials = credentials;
            if let Some(outdir) = args.get(2) {
                data.outdir = outdir.into();
            }
            if let Some(pattern) = args.get(3) {
                data = data.matching(pattern.as_str());
            }
            if fetch(&client, &mut data).await? {
                let total = data.entries.len();
                let ok = client
                    .download_with_progress(&mut data, |file, i, n| {
                        println!("[{}/{}] {}", i + 1, n, file.filename)
                    })
                    .await;
                info!(files = total, ok, "download finished");
            }
            report(&data)?;
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }
    Ok(())
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing {}\n\n{}", name, USAGE))
}

fn limit(args: &[String], default: u32) -> anyhow::Result<u32> {
    match args.get(1) {
        Some(s) => s.parse().context("LIMIT must be an integer"),
        None => Ok(default),
    }
}

fn range_from(args: &[String], index: usize) -> anyhow::Result<DateRange> {
    let begin = arg(args, index, "BEGIN")?;
    let days = match args.get(index + 1) {
        Some(s) => s.parse().context("DAYS must be a number")?,
        None => 1.0,
    };
    Ok(DateRange::starting(begin, days))
}

/// Print warnings and fail on errors recorded by the server or the client.
fn report<R: Resource>(resource: &R) -> anyhow::Result<()> {
    let status = resource.status();
    for warning in &status.warnings {
        eprintln!("warning: {}", warning);
    }
    if status.is_rejected() {
        bail!("{} request rejected: {}", resource.api_name(), status.errors.join("; "));
    }
    Ok(())
}
