use super::histogram1d::Histogram;
use polars::prelude::*;
use std::time::Instant;

impl Histogram {
    pub fn fill(&mut self, value: f64) {
        match self.get_bin_index(value) {
            Some(index) => self.bins[index] += 1,
            None if value >= self.range.1 => self.overflow += 1,
            // NaN lands here along with values below the range
            None => self.underflow += 1,
        }
    }

    pub fn fill_slice(&mut self, values: &[f64]) {
        for value in values {
            self.fill(*value);
        }
    }

    pub fn fill_from_lazyframe(&mut self, lf: LazyFrame, column: &str) -> PolarsResult<()> {
        let start = Instant::now();

        let (min_val, max_val) = self.range;
        let bin_width = self.bin_width;

        let raw_bin = ((col(column) - lit(min_val)) / lit(bin_width)).cast(DataType::Int32);

        let bin_index = when(col(column).lt(lit(min_val)))
            .then(lit(-2))
            .when(col(column).gt_eq(lit(max_val)))
            .then(lit(-1))
            .otherwise(raw_bin)
            .alias("bin_index");

        let df = lf
            .filter(col(column).is_not_null())
            .with_columns([bin_index])
            .group_by([col("bin_index")])
            .agg([col("bin_index").count().cast(DataType::UInt64).alias("count")])
            .sort(["bin_index"], Default::default())
            .collect()?;

        let bin_indices = df.column("bin_index")?.as_materialized_series().i32()?.clone();
        let counts = df.column("count")?.as_materialized_series().u64()?.clone();

        for (bin_opt, count_opt) in bin_indices.into_iter().zip(counts.into_iter()) {
            if let (Some(bin), Some(count)) = (bin_opt, count_opt) {
                match bin {
                    -2 => self.underflow += count,
                    -1 => self.overflow += count,
                    // rounding can land a value just below the range end on bins.len()
                    i if i >= 0 && !self.bins.is_empty() => {
                        let idx = (i as usize).min(self.bins.len() - 1);
                        self.bins[idx] += count;
                    }
                    _ => {}
                }
            }
        }

        log::info!("Filled histogram {} in {:?}", self.name, start.elapsed());

        Ok(())
    }
}
