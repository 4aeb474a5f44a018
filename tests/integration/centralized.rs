//! Wires every adapted scenario in `tests/integration/*` up to a concrete
//! `#[tokio::test]` against a Centralized deployment. Each test is
//! `#[ignore]`d by default since it needs a live Redis server — run with
//! `cargo test -- --ignored` against a real deployment.

#[cfg(feature = "i-client")]
mod client {
  centralized_test!(client, should_ping_once_connected);
  centralized_test!(client, should_record_a_pool_checkout_per_round_trip);
}

#[cfg(feature = "i-keys")]
mod keys {
  centralized_test!(keys, should_set_and_get_a_value);
  centralized_test!(keys, should_incr_a_missing_key_from_zero);
  centralized_test!(keys, should_report_exists_correctly);
  centralized_test!(keys, should_expire_and_read_back_ttl);
  centralized_test!(keys, should_mset_and_mget_several_keys);
}

#[cfg(feature = "i-hashes")]
mod hashes {
  centralized_test!(hashes, should_hset_and_hget_a_field);
  centralized_test!(hashes, should_hgetall_every_field);
}

#[cfg(feature = "i-lists")]
mod lists {
  centralized_test!(lists, should_lpush_and_lrange_a_list);
  centralized_test!(lists, should_report_the_new_length_after_lpush);
}

#[cfg(feature = "i-server")]
mod server {
  centralized_test!(server, should_ping_the_server);
  centralized_test!(server, should_echo_back_the_message);
}

#[cfg(feature = "i-pubsub")]
mod pubsub {
  centralized_test!(pubsub, should_publish_with_no_subscribers);
  centralized_test!(pubsub, should_subscribe_without_error);
}

#[cfg(feature = "transactions")]
mod multi {
  centralized_test!(multi, should_commit_a_transaction);
  centralized_test!(multi, should_abort_a_watched_transaction_on_concurrent_write);
  centralized_test!(multi, should_commit_a_watched_transaction_across_a_shared_hash_tag);
}

mod pool {
  standalone_test!(pool, should_ping_every_client_in_the_pool);
  standalone_test!(pool, should_round_robin_across_clients);
}

mod other {
  standalone_test!(other, should_connect_and_ping);
  standalone_test!(other, should_fail_to_connect_with_a_bad_host);
  standalone_test!(other, pool_should_connect_and_ping);
  standalone_test!(other, pool_should_fail_to_connect_with_a_bad_host);
  standalone_test!(other, should_report_pool_exhaustion_metric);

  centralized_test!(other, should_gracefully_quit);
  centralized_test!(other, should_not_hang_on_concurrent_quit);
  #[cfg(feature = "i-keys")]
  centralized_test!(other, should_pipeline_and_preserve_reply_order);
  #[cfg(all(feature = "i-keys", feature = "i-hashes"))]
  centralized_test!(other, should_not_short_circuit_on_an_early_pipeline_error);
  #[cfg(feature = "i-keys")]
  centralized_test!(other, should_reuse_a_pipeline_across_batches);
}

#[cfg(feature = "tracking")]
mod tracking {
  tracking_test!(tracking, should_serve_a_repeated_read_from_cache);
  tracking_test!(tracking, should_invalidate_on_a_sibling_write);
}
