//! Cost accumulator threaded through embedding calls (spec §4.2: "Semantic-similarity
//! MAY thread a cost accumulator through embedding calls... Both success and failure
//! paths return the updated accumulator.").

use rust_decimal::Decimal;

#[derive(Clone, Copy, Debug, Default)]
pub struct CostAccumulator {
    pub embedding_calls: u32,
    pub embedding_cost: Decimal,
}

impl CostAccumulator {
    /// Flat per-call cost; callers that need real provider pricing can post-process
    /// `embedding_calls` against their own rate table.
    const PER_CALL_COST: &'static str = "0.0001";

    pub fn record_call(&mut self) {
        self.embedding_calls += 1;
        self.embedding_cost += Self::PER_CALL_COST.parse::<Decimal>().unwrap();
    }
}
