use crate::error::{PowerflowError, Result};

/// Per-socket share of a node power limit
///
/// The node limit is first rounded down to a multiple of `nsockets`, so the
/// programmed total never exceeds the request and falls short of it by less
/// than `nsockets` watts. Memory and uncore power are not accounted for.
pub fn split_node_limit(node_limit_watts: u32, nsockets: u32) -> Result<u32> {
    if nsockets == 0 {
        return Err(PowerflowError::InvalidTopology(
            "cannot distribute a node power limit across zero sockets".into(),
        ));
    }

    let remainder = node_limit_watts % nsockets;
    if remainder != 0 {
        tracing::debug!(
            "Node limit {node_limit_watts} W not divisible by {nsockets} sockets, dropping {remainder} W"
        );
    }

    Ok((node_limit_watts - remainder) / nsockets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_limit_rounds_down() {
        assert_eq!(split_node_limit(101, 2).unwrap(), 50);
        assert_eq!(split_node_limit(200, 2).unwrap(), 100);
    }

    #[test]
    fn test_zero_sockets_is_invalid_topology() {
        assert!(matches!(
            split_node_limit(100, 0),
            Err(PowerflowError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_bounds_hold_for_all_small_inputs() {
        for nsockets in 1..=8u32 {
            for node in 0..=500u32 {
                let per_socket = split_node_limit(node, nsockets).unwrap();
                let total = per_socket * nsockets;
                assert!(total <= node);
                assert!(node - total < nsockets);
            }
        }
    }
}
