//! DNS message inspection
//!
//! Parses wire-format DNS messages just far enough to find the DNSSEC-OK (DO)
//! bit in the EDNS0 OPT pseudo-record and clear it, so the upgraded QUIC path
//! never has to negotiate EDNS0 buffer sizing. Grounded on the original's
//! `clearDO`/`UnsetDo` (`client.go`), reimplemented against `hickory-proto`'s
//! real DNS codec rather than hand-rolled wire parsing.

use hickory_proto::op::Message;

/// Clears the DO bit on `msg` if present, returning the (possibly unchanged)
/// bytes and whether DO was set on input.
///
/// A message that fails to parse, or that carries no EDNS0 extension, or
/// whose DO bit is already clear, is returned byte-for-byte identical to the
/// input with `false`. Re-serialization failure is treated the same way: the
/// caller always gets a message to send, matching the original's
/// fail-open behavior.
pub fn clear_do(msg: &[u8]) -> (Vec<u8>, bool) {
    let mut message = match Message::from_vec(msg) {
        Ok(message) => message,
        Err(_) => return (msg.to_vec(), false),
    };

    let was_set = match message.extensions() {
        Some(edns) => edns.dnssec_ok(),
        None => false,
    };

    if !was_set {
        return (msg.to_vec(), false);
    }

    if let Some(edns) = message.extensions_mut() {
        edns.set_dnssec_ok(false);
    }

    match message.to_vec() {
        Ok(bytes) => (bytes, true),
        Err(_) => (msg.to_vec(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Edns, MessageType, OpCode, Query};
    use hickory_proto::rr::Name;
    use std::str::FromStr;

    fn query_with_do(do_bit: bool) -> Vec<u8> {
        let mut message = Message::new();
        message
            .set_id(42)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query);
        message.add_query(Query::query(
            Name::from_str("example.com.").unwrap(),
            hickory_proto::rr::RecordType::A,
        ));
        let mut edns = Edns::new();
        edns.set_dnssec_ok(do_bit);
        message.set_edns(edns);
        message.to_vec().unwrap()
    }

    #[test]
    fn clears_set_do_bit() {
        let msg = query_with_do(true);
        let (out, was_set) = clear_do(&msg);
        assert!(was_set);
        let reparsed = Message::from_vec(&out).unwrap();
        assert!(!reparsed.extensions().as_ref().unwrap().dnssec_ok());
    }

    #[test]
    fn leaves_clear_do_bit_untouched() {
        let msg = query_with_do(false);
        let (out, was_set) = clear_do(&msg);
        assert!(!was_set);
        assert_eq!(out, msg);
    }

    #[test]
    fn leaves_no_edns_untouched() {
        let mut message = Message::new();
        message
            .set_id(7)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query);
        message.add_query(Query::query(
            Name::from_str("example.org.").unwrap(),
            hickory_proto::rr::RecordType::A,
        ));
        let msg = message.to_vec().unwrap();

        let (out, was_set) = clear_do(&msg);
        assert!(!was_set);
        assert_eq!(out, msg);
    }

    #[test]
    fn passes_through_garbage_unchanged() {
        let garbage = vec![0xff, 0x00, 0x01, 0x02];
        let (out, was_set) = clear_do(&garbage);
        assert!(!was_set);
        assert_eq!(out, garbage);
    }

    #[test]
    fn clear_do_is_idempotent() {
        let msg = query_with_do(true);
        let (once, _) = clear_do(&msg);
        let (twice, was_set_again) = clear_do(&once);
        assert!(!was_set_again);
        assert_eq!(once, twice);
    }
}
