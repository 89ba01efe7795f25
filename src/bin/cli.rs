//! prosafe CLI
//!
//! Command-line interface for managing ProSafe Plus switches.

use std::process::ExitCode;

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use prosafe::attribute::{hex, Dictionary, ValueContext, DISCOVERY_ATTRIBUTES};
use prosafe::network::list_interfaces;
use prosafe::operations::{self, QueryResult, RawProbe, Reading, ALL_ATTRIBUTES};
use prosafe::protocol::{Tag, TlvRecord, END_TAG};
use prosafe::{Config, MacAddr, NsdpError, PasswordMode, Result, Session};

/// Manage Netgear ProSafe Plus switches
#[derive(Parser, Debug)]
#[command(name = "prosafe-cli")]
#[command(about = "Manage Netgear ProSafe Plus switches")]
#[command(version)]
struct Args {
    /// Network interface to use
    #[arg(short, long, default_value = "eth0", global = true)]
    interface: String,

    /// Enable debug output (packet dumps)
    #[arg(short, long, global = true)]
    debug: bool,

    /// Timeout for switch commands in seconds
    #[arg(short, long, default_value_t = 0.1, global = true)]
    timeout: f64,

    /// Sends per request before giving up
    #[arg(long, default_value_t = 3, global = true)]
    retries: u32,

    /// Resend set requests on timeout as well
    #[arg(long, global = true)]
    retry_writes: bool,

    /// Number of switch ports, bounds port numbers in values
    #[arg(long, default_value_t = 8, global = true)]
    ports: u8,

    /// Send passwords unobfuscated (early firmware)
    #[arg(long, global = true)]
    plain_password: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Remap an attribute to another tag, e.g. loop_detection=0x9000
    #[arg(long = "tag-override", value_name = "NAME=TAG", value_parser = parse_tag_override, global = true)]
    tag_overrides: Vec<(String, Tag)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for switches on the interface's subnet
    Discover,

    /// Query values from a switch
    Query {
        /// Hardware address of the switch
        #[arg(short, long)]
        mac: MacAddr,

        /// Switch password
        #[arg(short, long)]
        passwd: Option<String>,

        /// What to query for ('list' shows options, 'all' queries everything)
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Dump raw records, including unknown tags
    QueryRaw {
        /// Hardware address of the switch
        #[arg(short, long)]
        mac: MacAddr,

        /// Switch password
        #[arg(short, long)]
        passwd: Option<String>,

        /// Probe tags one by one starting here
        #[arg(long, value_parser = parse_tag_number)]
        from: Option<u16>,

        /// Last tag to probe
        #[arg(long, value_parser = parse_tag_number)]
        to: Option<u16>,
    },

    /// Set values on a switch
    Set(SetArgs),

    /// Set a password without knowing the old one (2012 firmware)
    Exploit {
        /// Hardware address of the switch
        #[arg(short, long)]
        mac: MacAddr,

        /// New password to set
        #[arg(short = 'p', long)]
        new_password: String,
    },

    /// List local interfaces with an IPv4 address
    Interfaces,
}

#[derive(ClapArgs, Debug)]
struct SetArgs {
    /// Hardware address of the switch
    #[arg(short, long)]
    mac: MacAddr,

    /// Switch password
    #[arg(short, long)]
    passwd: String,

    /// Switch name
    #[arg(long)]
    name: Option<String>,

    /// Switch location
    #[arg(long)]
    location: Option<String>,

    /// IP address
    #[arg(long)]
    ip: Option<String>,

    /// Netmask
    #[arg(long)]
    netmask: Option<String>,

    /// Gateway
    #[arg(long)]
    gateway: Option<String>,

    /// New password
    #[arg(long)]
    new_password: Option<String>,

    /// DHCP (on/off)
    #[arg(long)]
    dhcp: Option<String>,

    /// Reboot the switch
    #[arg(long)]
    reboot: bool,

    /// Factory reset the switch
    #[arg(long)]
    factory_reset: bool,

    /// Reset port statistics
    #[arg(long)]
    reset_port_stat: bool,

    /// VLAN mode (none/port/id/802.1q_id/802.1q_extended)
    #[arg(long)]
    vlan_support: Option<String>,

    /// Port-based VLAN: VLAN_ID:PORTS (e.g. '10:1,2,3')
    #[arg(long)]
    vlan_id: Option<String>,

    /// 802.1Q VLAN: VLAN_ID:TAGGED:UNTAGGED (e.g. '20:1,7:2,3' or '20:7:')
    #[arg(long)]
    vlan802_id: Option<String>,

    /// Delete an 802.1Q VLAN by id
    #[arg(long)]
    vlan_delete: Option<String>,

    /// Port VLAN id: PORT:VLAN_ID (e.g. '1:10')
    #[arg(long)]
    vlan_pvid: Option<String>,

    /// QoS mode (port_based/802.1p)
    #[arg(long)]
    qos: Option<String>,

    /// Port priority: PORT:PRIORITY (e.g. '1:HIGH')
    #[arg(long)]
    port_based_qos: Option<String>,

    /// Incoming limit: PORT:LIMIT (e.g. '1:512K')
    #[arg(long)]
    bandwidth_in: Option<String>,

    /// Outgoing limit: PORT:LIMIT (e.g. '1:1M')
    #[arg(long)]
    bandwidth_out: Option<String>,

    /// Broadcast limit: PORT:LIMIT (e.g. '1:NONE')
    #[arg(long)]
    broadcast_bandwidth: Option<String>,

    /// Port mirroring: DST_PORT:SRC_PORTS (e.g. '1:2,3,4' or '0:0' to disable)
    #[arg(long)]
    port_mirror: Option<String>,

    /// IGMP snooping (none or VLAN_ID)
    #[arg(long)]
    igmp_snooping: Option<String>,

    /// Block unknown multicast (on/off)
    #[arg(long)]
    block_unknown_multicast: Option<String>,

    /// IGMP header validation (on/off)
    #[arg(long)]
    igmp_header_validation: Option<String>,

    /// Loop detection (on/off)
    #[arg(long)]
    loop_detection: Option<String>,
}

impl SetArgs {
    /// Attribute name and text for every flag given, in table order
    fn assignments(&self) -> Vec<(&'static str, String)> {
        let texts = [
            ("name", &self.name),
            ("location", &self.location),
            ("ip", &self.ip),
            ("netmask", &self.netmask),
            ("gateway", &self.gateway),
            ("new_password", &self.new_password),
            ("dhcp", &self.dhcp),
            ("vlan_support", &self.vlan_support),
            ("vlan_id", &self.vlan_id),
            ("vlan802_id", &self.vlan802_id),
            ("vlan_delete", &self.vlan_delete),
            ("vlan_pvid", &self.vlan_pvid),
            ("qos", &self.qos),
            ("port_based_qos", &self.port_based_qos),
            ("bandwidth_in", &self.bandwidth_in),
            ("bandwidth_out", &self.bandwidth_out),
            ("broadcast_bandwidth", &self.broadcast_bandwidth),
            ("port_mirror", &self.port_mirror),
            ("igmp_snooping", &self.igmp_snooping),
            ("block_unknown_multicast", &self.block_unknown_multicast),
            ("igmp_header_validation", &self.igmp_header_validation),
            ("loop_detection", &self.loop_detection),
        ];
        let actions = [
            ("reboot", self.reboot),
            ("factory_reset", self.factory_reset),
            ("reset_port_stat", self.reset_port_stat),
        ];

        texts
            .into_iter()
            .filter_map(|(name, text)| text.clone().map(|t| (name, t)))
            .chain(
                actions
                    .into_iter()
                    .filter(|(_, on)| *on)
                    .map(|(name, _)| (name, "on".to_string())),
            )
            .collect()
    }
}

fn parse_tag_number(text: &str) -> std::result::Result<u16, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| format!("'{}' is not a 16-bit tag number", text))
}

fn parse_tag_override(text: &str) -> std::result::Result<(String, Tag), String> {
    let (name, tag) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=TAG, got '{}'", text))?;
    Ok((name.trim().to_string(), Tag(parse_tag_number(tag.trim())?)))
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.debug { "warn,prosafe=trace" } else { "warn" })
    });

    fmt()
        .with_env_filter(filter)
        .with_target(args.debug)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("prosafe-cli v{}", prosafe::VERSION);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;
    let dictionary = build_dictionary(args)?;

    match &args.command {
        Commands::Discover => discover(args, config, dictionary),
        Commands::Query { mac, passwd, items } => {
            query(args, config, dictionary, *mac, passwd.as_deref(), items)
        }
        Commands::QueryRaw {
            mac,
            passwd,
            from,
            to,
        } => query_raw(args, config, dictionary, *mac, passwd.as_deref(), *from, *to),
        Commands::Set(set) => set_values(args, config, dictionary, set),
        Commands::Exploit { mac, new_password } => {
            let mut session = Session::open(config)?.with_dictionary(dictionary);
            let outcome = operations::exploit(&mut session, *mac, new_password);
            session.close();
            outcome?;
            report_ok(args)
        }
        Commands::Interfaces => {
            let endpoints = list_interfaces();
            if args.json {
                return print_json(&endpoints);
            }
            for e in endpoints {
                println!("{:<16} {}  {:<15} broadcast {}", e.name, e.mac, e.ip, e.broadcast);
            }
            Ok(())
        }
    }
}

fn build_config(args: &Args) -> Result<Config> {
    if args.ports == 0 {
        return Err(NsdpError::Config("port count must be at least 1".to_string()));
    }

    let password_mode = if args.plain_password {
        PasswordMode::Plain
    } else {
        PasswordMode::Obfuscated
    };

    Ok(Config::builder()
        .timeout_secs(args.timeout)?
        .interface(&args.interface)
        .max_attempts(args.retries)
        .retry_writes(args.retry_writes)
        .port_count(args.ports)
        .password_mode(password_mode)
        .build())
}

fn build_dictionary(args: &Args) -> Result<Dictionary> {
    args.tag_overrides
        .iter()
        .try_fold(Dictionary::standard(), |dictionary, (name, tag)| {
            dictionary.with_tag_override(name, *tag)
        })
}

// =============================================================================
// Commands
// =============================================================================

fn discover(args: &Args, config: Config, dictionary: Dictionary) -> Result<()> {
    let mut session = Session::open(config)?.with_dictionary(dictionary);
    if !args.json {
        println!("Searching for ProSafe Plus Switches ...\n");
    }

    let found = operations::discover(&mut session);
    session.close();
    let found = found?;

    if args.json {
        return print_json(&found);
    }

    for switch in &found {
        println!("{:<16}{}", "switch_mac:", switch.mac);
        if let Some(ip) = switch.ip {
            println!("{:<16}{}", "reply_from:", ip);
        }
        for name in DISCOVERY_ATTRIBUTES {
            if let Some(value) = switch.attributes.get(*name) {
                println!("{:<16}{}", format!("{}:", name), value);
            }
        }
        println!();
    }

    if found.is_empty() {
        println!("No result received...");
        println!("did you try to adjust your timeout?");
    }
    Ok(())
}

fn query(
    args: &Args,
    config: Config,
    dictionary: Dictionary,
    mac: MacAddr,
    passwd: Option<&str>,
    items: &[String],
) -> Result<()> {
    if items.iter().any(|i| i == "list") {
        let mut names: Vec<&str> = dictionary.queryable().map(|d| d.name).collect();
        names.push(ALL_ATTRIBUTES);
        names.sort_unstable();
        println!("Available query options:");
        for name in names {
            println!("  {}", name);
        }
        return Ok(());
    }

    let items: Vec<&str> = items.iter().map(String::as_str).collect();
    operations::resolve_query_items(&dictionary, &items)?;

    let mut session = Session::open(config)?.with_dictionary(dictionary);
    let result = operations::query(&mut session, mac, &items, passwd);
    session.close();
    let result = result?;

    if args.json {
        return print_json(&result);
    }

    println!("Query Values..\n");
    print_query(&result, args.debug);
    Ok(())
}

fn print_query(result: &QueryResult, debug: bool) {
    for entry in &result.entries {
        match &entry.reading {
            Reading::Supported(values) => {
                for value in values {
                    println!("{:<29} {}", entry.name, value);
                }
            }
            Reading::Unsupported => println!("{:<29} unsupported by this device", entry.name),
            Reading::Undecodable {
                decoded,
                raw,
                reason,
            } => {
                for value in decoded {
                    println!("{:<29} {}", entry.name, value);
                }
                println!("{:<29} undecodable {} ({})", entry.name, hex(raw), reason);
            }
        }
    }

    if debug {
        for record in &result.unsolicited {
            println!("-{:<28} {}", record.tag, hex(&record.value));
        }
    }
}

fn query_raw(
    args: &Args,
    config: Config,
    dictionary: Dictionary,
    mac: MacAddr,
    passwd: Option<&str>,
    from: Option<u16>,
    to: Option<u16>,
) -> Result<()> {
    let sweep = match (from, to) {
        (None, None) => None,
        (from, to) => {
            let start = from.unwrap_or(0x0001);
            let end = to.unwrap_or(END_TAG.0 - 1).min(END_TAG.0 - 1);
            if start > end {
                return Err(NsdpError::Config(format!(
                    "empty tag range 0x{:04x}..=0x{:04x}",
                    start, end
                )));
            }
            Some(start..=end)
        }
    };

    let mut session = Session::open(config)?.with_dictionary(dictionary.clone());
    let outcome = match sweep {
        Some(range) => operations::sweep_raw(&mut session, mac, passwd, range).map(RawOutput::Sweep),
        None => operations::query_raw(&mut session, mac, passwd).map(RawOutput::Records),
    };
    session.close();
    let outcome = outcome?;

    if args.json {
        return print_json(&outcome);
    }

    println!("QUERY DEBUG RAW");
    match outcome {
        RawOutput::Records(records) => {
            for record in &records {
                print_raw_record(&dictionary, record);
            }
        }
        RawOutput::Sweep(probes) => {
            for probe in &probes {
                print_probe(&dictionary, probe);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(untagged)]
enum RawOutput {
    Records(Vec<TlvRecord>),
    Sweep(Vec<RawProbe>),
}

fn print_raw_record(dictionary: &Dictionary, record: &TlvRecord) {
    match dictionary.by_tag(record.tag) {
        Some(d) => println!("RES:{:04x}:{:<29}:{}", record.tag.0, d.name, hex(&record.value)),
        None => println!("NON:{:04x}:{:<29}:{}", record.tag.0, "", hex(&record.value)),
    }
}

fn print_probe(dictionary: &Dictionary, probe: &RawProbe) {
    if let Some(error) = &probe.error {
        println!("ERR:{:04x}:{}", probe.tag.0, error);
        return;
    }
    if probe.records.is_empty() {
        println!("NON:{:04x}:{:<29}:", probe.tag.0, "");
    }
    for record in &probe.records {
        print_raw_record(dictionary, record);
    }
}

fn set_values(args: &Args, config: Config, dictionary: Dictionary, set: &SetArgs) -> Result<()> {
    let pairs = set.assignments();
    let pairs: Vec<(&str, &str)> = pairs.iter().map(|(n, t)| (*n, t.as_str())).collect();

    // Validate before touching the network
    let assignments =
        operations::prepare_assignments(&dictionary, &ValueContext::from(&config), &pairs)?;
    if assignments.is_empty() {
        return Err(NsdpError::invalid_value("set", "nothing to set"));
    }

    let mut session = Session::open(config)?.with_dictionary(dictionary);
    if !args.json {
        println!("Changing Values..\n");
    }
    let outcome = operations::apply(&mut session, set.mac, Some(&set.passwd), &assignments);
    session.close();
    outcome?;

    report_ok(args)
}

// =============================================================================
// Output
// =============================================================================

fn report_ok(args: &Args) -> Result<()> {
    if args.json {
        return print_json(&serde_json::json!({ "status": "ok" }));
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| NsdpError::Config(format!("cannot serialize output: {}", e)))?;
    println!("{}", text);
    Ok(())
}
