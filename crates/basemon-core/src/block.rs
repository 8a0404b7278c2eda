//! Latest-block inspection.
//!
//! Turns a block hash into a [`BlockSummary`]. With detailed accounting on,
//! every transaction in the block is decoded to count its inputs and
//! outputs, which costs one RPC call per transaction.

use bitcoin::BlockHash;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::rpc::RpcClient;
use crate::types::BlockSummary;

pub struct BlockInspector {
    rpc: RpcClient,
    detailed_accounting: bool,
}

impl BlockInspector {
    /// `detailed_accounting` requires bitcoind to run with `txindex=1`;
    /// without it `getrawtransaction` fails for confirmed transactions.
    pub fn new(rpc: RpcClient, detailed_accounting: bool) -> Self {
        Self {
            rpc,
            detailed_accounting,
        }
    }

    pub fn detailed_accounting(&self) -> bool {
        self.detailed_accounting
    }

    /// Summarize the block with the given hash.
    ///
    /// A failed block fetch is returned as [`CoreError::BlockFetch`] with no
    /// partial summary. A failed transaction fetch only drops that
    /// transaction from the input/output totals.
    pub async fn fetch_block(&self, hash: &BlockHash) -> Result<BlockSummary, CoreError> {
        let block = self
            .rpc
            .get_block(hash)
            .await
            .map_err(|source| CoreError::BlockFetch {
                hash: *hash,
                source,
            })?;

        let mut summary = BlockSummary {
            size: block.size,
            tx_count: block.tx.len() as u64,
            ..BlockSummary::default()
        };

        if !self.detailed_accounting {
            return Ok(summary);
        }

        for txid in &block.tx {
            match self.rpc.get_raw_transaction(txid).await {
                Ok(tx) => {
                    summary.inputs += tx.input_count();
                    summary.outputs += tx.output_count();
                }
                Err(source) => {
                    let err = CoreError::TransactionFetch {
                        txid: *txid,
                        source,
                    };
                    warn!(block = %hash, error = %err, "skipping transaction in block totals");
                    summary.skipped_transactions += 1;
                }
            }
        }

        debug!(
            block = %hash,
            txs = summary.tx_count,
            inputs = summary.inputs,
            outputs = summary.outputs,
            skipped = summary.skipped_transactions,
            "block inspected"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::hashes::Hash;
    use bitcoin::Txid;

    use super::*;
    use crate::rpc::mock::{MockTransport, MockTransportBuilder};

    fn txid(b: u8) -> Txid {
        Txid::from_byte_array([b; 32])
    }

    fn block_hash() -> BlockHash {
        BlockHash::from_byte_array([0xab; 32])
    }

    fn raw_tx(id: Txid, inputs: usize, outputs: usize) -> serde_json::Value {
        serde_json::json!({
            "txid": id.to_string(),
            "vin": vec![serde_json::json!({}); inputs],
            "vout": vec![serde_json::json!({}); outputs],
        })
    }

    fn with_block(builder: MockTransportBuilder, txids: &[Txid]) -> MockTransportBuilder {
        builder.respond(
            &format!("getblock {}", block_hash()),
            serde_json::json!({
                "hash": block_hash().to_string(),
                "size": 1_234_567,
                "tx": txids.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }),
        )
    }

    #[tokio::test]
    async fn accounting_disabled_reports_zero_and_skips_tx_calls() {
        let txids = [txid(1), txid(2)];
        let mock = with_block(MockTransport::builder(), &txids)
            .respond("getrawtransaction", raw_tx(txid(1), 3, 4))
            .build();
        let inspector = BlockInspector::new(RpcClient::new(mock.clone()), false);

        let summary = inspector
            .fetch_block(&block_hash())
            .await
            .expect("block fetch must succeed");
        assert_eq!(summary.size, 1_234_567);
        assert_eq!(summary.tx_count, 2);
        assert_eq!((summary.inputs, summary.outputs), (0, 0));
        assert_eq!(mock.call_count("getrawtransaction"), 0);
    }

    #[tokio::test]
    async fn accounting_enabled_sums_every_transaction() {
        let txids = [txid(1), txid(2), txid(3)];
        let mock = with_block(MockTransport::builder(), &txids)
            .respond(&format!("getrawtransaction {}", txid(1)), raw_tx(txid(1), 1, 2))
            .respond(&format!("getrawtransaction {}", txid(2)), raw_tx(txid(2), 2, 2))
            .respond(&format!("getrawtransaction {}", txid(3)), raw_tx(txid(3), 5, 1))
            .build();
        let inspector = BlockInspector::new(RpcClient::new(mock), true);

        let summary = inspector
            .fetch_block(&block_hash())
            .await
            .expect("block fetch must succeed");
        assert_eq!(summary.inputs, 8);
        assert_eq!(summary.outputs, 5);
        assert_eq!(summary.skipped_transactions, 0);
    }

    #[tokio::test]
    async fn one_failing_transaction_is_left_out_of_the_totals() {
        let txids = [txid(1), txid(2), txid(3)];
        let mock = with_block(MockTransport::builder(), &txids)
            .respond(&format!("getrawtransaction {}", txid(1)), raw_tx(txid(1), 1, 2))
            .fail(
                &format!("getrawtransaction {}", txid(2)),
                5,
                "error code: -5\nerror message:\nNo such mempool or blockchain transaction.",
            )
            .respond(&format!("getrawtransaction {}", txid(3)), raw_tx(txid(3), 5, 1))
            .build();
        let inspector = BlockInspector::new(RpcClient::new(mock), true);

        let summary = inspector
            .fetch_block(&block_hash())
            .await
            .expect("one bad transaction must not fail the block");
        assert_eq!(summary.tx_count, 3);
        assert_eq!(summary.inputs, 6);
        assert_eq!(summary.outputs, 3);
        assert_eq!(summary.skipped_transactions, 1);
    }

    #[tokio::test]
    async fn failed_block_fetch_returns_no_partial_summary() {
        let mock = MockTransport::builder()
            .fail("getblock", 5, "error code: -5\nerror message:\nBlock not found")
            .build();
        let inspector = BlockInspector::new(RpcClient::new(mock), true);

        let err = inspector
            .fetch_block(&block_hash())
            .await
            .expect_err("missing block must fail");
        assert!(matches!(err, CoreError::BlockFetch { hash, .. } if hash == block_hash()));
    }
}
