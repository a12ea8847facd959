use crate::request::{labelled_points, matrix, GuaranteeRequest, SampleRequest};
use anyhow::Context;
use serde_wasm_bindgen::{from_value, to_value};
use stability_core::algorithms::SearchConfig;
use stability_core::guarantee::Guarantee;
use stability_core::registry::{PreparedSearch, SearchSummary, Strategy};
use stability_core::traits::Clock;
use stability_core::verification::SamplingOracle;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

/// Wall clock for the browser, where `std::time::Instant` is unavailable.
#[cfg(target_arch = "wasm32")]
struct JsClock;

#[cfg(target_arch = "wasm32")]
impl Clock for JsClock {
    fn now(&self) -> f64 {
        js_sys::Date::now() / 1000.0
    }
}

fn default_clock() -> Arc<dyn Clock> {
    #[cfg(target_arch = "wasm32")]
    {
        Arc::new(JsClock)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Arc::new(stability_core::traits::SystemClock::new())
    }
}

#[wasm_bindgen]
pub struct WasmGuaranteeRunner {
    search: PreparedSearch,
    oracle: SamplingOracle,
    shape: (usize, usize),
}

#[wasm_bindgen]
impl WasmGuaranteeRunner {
    /// `strategy` is a short name (`td+bu-d-dfs`) or numeric id; `config` may be undefined.
    #[wasm_bindgen(constructor)]
    pub fn new(
        strategy: &str,
        request_val: JsValue,
        config_val: JsValue,
        samples_val: JsValue,
    ) -> Result<WasmGuaranteeRunner, JsValue> {
        console_error_panic_hook::set_once();

        let request: GuaranteeRequest = from_value(request_val)
            .map_err(|e| JsValue::from_str(&format!("Invalid guarantee request: {}", e)))?;
        let config: SearchConfig = if config_val.is_undefined() || config_val.is_null() {
            SearchConfig::default()
        } else {
            from_value(config_val)
                .map_err(|e| JsValue::from_str(&format!("Invalid search config: {}", e)))?
        };
        let samples: Vec<SampleRequest> = from_value(samples_val)
            .map_err(|e| JsValue::from_str(&format!("Invalid samples: {}", e)))?;

        Self::build(strategy, &request, config, samples, default_clock())
            .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
    }

    /// Overrides the starting bounds (row-major). Only parallelepipedal strategies accept this.
    pub fn set_bounds(
        &mut self,
        lb: Option<Vec<f64>>,
        ub: Option<Vec<f64>>,
    ) -> Result<(), JsValue> {
        self.apply_bounds(lb, ub)
            .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
    }

    pub fn strategy(&self) -> String {
        self.search.strategy().to_string()
    }

    pub fn run(&mut self) -> Result<JsValue, JsValue> {
        let summary = self
            .run_summary()
            .map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;
        to_value(&summary).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

impl WasmGuaranteeRunner {
    pub(crate) fn build(
        strategy: &str,
        request: &GuaranteeRequest,
        config: SearchConfig,
        samples: Vec<SampleRequest>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let strategy: Strategy = strategy.parse()?;
        let params = request.to_params()?;
        let samples = labelled_points(samples, request.shape())?;

        let search = strategy
            .prepare(&params, &config, clock.clone())
            .with_context(|| format!("Failed to prepare strategy {}", strategy))?;
        // Complete witnesses must come from the restricted domain the guarantee grows in.
        let oracle = if strategy.is_complete() {
            let domain = search.initial_guarantee().domain().clone();
            SamplingOracle::complete(params.c_star, samples, domain, clock)
        } else {
            SamplingOracle::sound(params.c_star, samples, clock)
        };

        Ok(Self {
            search,
            oracle,
            shape: request.shape(),
        })
    }

    pub(crate) fn apply_bounds(
        &mut self,
        lb: Option<Vec<f64>>,
        ub: Option<Vec<f64>>,
    ) -> anyhow::Result<()> {
        let lb = lb
            .map(|values| matrix(&values, self.shape).context("Invalid lower bound"))
            .transpose()?;
        let ub = ub
            .map(|values| matrix(&values, self.shape).context("Invalid upper bound"))
            .transpose()?;
        self.search.set_bounds(lb, ub)?;
        Ok(())
    }

    pub(crate) fn run_summary(&mut self) -> anyhow::Result<SearchSummary> {
        let report = self
            .search
            .run(&mut self.oracle)
            .context("Oracle returned an unusable verdict")?;
        Ok(report.summary())
    }
}

/// Short names of every strategy, in id order.
#[wasm_bindgen]
pub fn strategy_names() -> Vec<String> {
    Strategy::ALL
        .iter()
        .map(|strategy| strategy.to_string())
        .collect()
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::WasmGuaranteeRunner;
    use crate::request::{GuaranteeRequest, SampleRequest};
    use serde_wasm_bindgen::{from_value, to_value};
    use stability_core::registry::SearchSummary;
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn request_value(radius: Option<f64>) -> JsValue {
        to_value(&GuaranteeRequest {
            x_star: vec![0.5, 0.5],
            rows: 1,
            cols: 2,
            c_star: 0,
            delta: 0.125,
            radius,
            domain_lb: 0.0,
            domain_ub: 1.0,
        })
        .expect("request")
    }

    fn samples_value() -> JsValue {
        to_value(&vec![SampleRequest {
            class: 1,
            point: vec![0.875, 0.5],
        }])
        .expect("samples")
    }

    #[wasm_bindgen_test]
    fn runner_returns_a_serialized_summary() {
        let mut runner = WasmGuaranteeRunner::new(
            "ctd+bu-l-dfs",
            request_value(Some(0.5)),
            JsValue::UNDEFINED,
            samples_value(),
        )
        .expect("runner");
        assert_eq!(runner.strategy(), "ctd+bu-l-dfs");

        let summary: SearchSummary = from_value(runner.run().expect("run")).expect("summary");
        assert!(summary.soundness);
        assert_eq!(summary.ub, vec![0.75, 1.0]);
        assert_eq!(summary.lb, vec![0.0, 0.0]);
    }

    #[wasm_bindgen_test]
    fn runner_rejects_malformed_requests() {
        let result = WasmGuaranteeRunner::new(
            "td",
            JsValue::from_str("not a request"),
            JsValue::UNDEFINED,
            samples_value(),
        );
        let message = result
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.contains("Invalid guarantee request"));
    }

    #[wasm_bindgen_test]
    fn cyclic_runner_rejects_bounds() {
        let mut runner = WasmGuaranteeRunner::new(
            "cbu-d",
            request_value(Some(0.5)),
            JsValue::UNDEFINED,
            samples_value(),
        )
        .expect("runner");
        let message = runner
            .set_bounds(None, Some(vec![0.75, 0.5]))
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.contains("parallelepipedal"));
    }
}
