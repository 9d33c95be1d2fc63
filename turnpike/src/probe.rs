use rand::{thread_rng, Rng};

use crate::error::{Error, Result};

/// SNMPv2c get-next for 1.3.6.1.2.1.5 (sysName), hand-rolled at the byte
/// level; a full ASN.1 stack would be absurd for one fixed PDU.
///
/// The single-byte ASN.1 length form caps the community string at 127
/// bytes; configuration validation enforces that before any traffic.
pub fn snmp_get_next(community: &str, request_id: u32) -> Result<Vec<u8>> {
    if community.len() > 127 {
        return Err(Error::Config(
            "community string must be at most 127 bytes".to_string(),
        ));
    }

    let mut inner = Vec::with_capacity(38 + community.len());
    // INTEGER version, 1 == v2c
    inner.extend_from_slice(&[0x02, 0x01, 0x01]);
    // OCTET STRING community
    inner.push(0x04);
    inner.push(community.len() as u8);
    inner.extend_from_slice(community.as_bytes());
    // GetNextRequest PDU, INTEGER request id
    inner.extend_from_slice(&[0xa1, 0x19, 0x02, 0x04]);
    inner.extend_from_slice(&request_id.to_be_bytes());
    // error-status 0, error-index 0, one varbind: OID 1.3.6.1.2.1.5, NULL
    inner.extend_from_slice(&[
        0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x0b, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x06,
        0x01, 0x02, 0x01, 0x05, 0x00,
    ]);

    let mut snmp = Vec::with_capacity(2 + inner.len());
    snmp.push(0x30);
    snmp.push(inner.len() as u8);
    snmp.extend_from_slice(&inner);

    Ok(snmp)
}

pub fn random_request_id() -> u32 {
    thread_rng().gen()
}

/// Standard DNS A query for the given name.
pub fn dns_a_query(name: &str, transaction_id: u16) -> Result<Vec<u8>> {
    let mut query = Vec::with_capacity(18 + name.len());
    query.extend_from_slice(&transaction_id.to_be_bytes());
    // flags: standard query, recursion desired
    query.extend_from_slice(&[0x01, 0x00]);
    // QDCOUNT 1, ANCOUNT 0, NSCOUNT 0, ARCOUNT 0
    query.extend_from_slice(&1u16.to_be_bytes());
    query.extend_from_slice(&0u16.to_be_bytes());
    query.extend_from_slice(&0u16.to_be_bytes());
    query.extend_from_slice(&0u16.to_be_bytes());

    for label in name.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(Error::Config(format!(
                "{name:?} is not a valid DNS name: bad label {label:?}"
            )));
        }

        query.push(label.len() as u8);
        query.extend_from_slice(label.as_bytes());
    }
    query.push(0x00);

    // QTYPE A, QCLASS IN
    query.extend_from_slice(&1u16.to_be_bytes());
    query.extend_from_slice(&1u16.to_be_bytes());

    Ok(query)
}

pub fn random_transaction_id() -> u16 {
    thread_rng().gen()
}
