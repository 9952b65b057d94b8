#[cfg(test)]
mod tests {
	use crate::advisor::*;
	use crate::config::*;
	use crate::error::*;
	use crate::export::*;
	use crate::forecast::*;
	use crate::pipeline::*;
	use crate::policies::*;
	use crate::series::*;
	use crate::source::*;
	use crate::types::*;
	use crate::utils::*;
	use async_trait::async_trait;
	use chrono::{Duration, TimeZone, Utc};

	fn init_tracing() {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_test_writer()
			.try_init();
	}

	fn t0() -> Timestamp {
		Utc.with_ymd_and_hms(2024, 11, 4, 0, 0, 0).unwrap()
	}

	fn hours_range(points: i64) -> TimeRange {
		TimeRange::new(t0(), t0() + Duration::hours(points - 1)).unwrap()
	}

	fn wavy(points: usize, seed: f64) -> Vec<f64> {
		(0..points)
			.map(|i| {
				let x = i as f64;
				50.0 + 20.0 * (x * 0.26 + seed).sin() + 7.0 * (x * 1.7 * seed).cos() + seed * x * 0.1
			})
			.collect()
	}

	#[test]
	fn test_flat_cpu_is_stable() {
		init_tracing();
		let pipeline = CapacityPipeline::new(PipelineConfig::default()).unwrap();
		let raw = hourly_samples(MetricName::Cpu, t0(), &[50.0; 48]);

		let report = pipeline.run(&raw, hours_range(48)).unwrap();
		assert!(report.horizon.points.iter().all(|p| p.p90 < 80.0));
		assert!(!report.recommendation.flagged);
		assert!(report.recommendation.breaching_points.is_empty());
		assert!(matches!(report.view.status, crate::view::StatusBanner::Stable(_)));
	}

	#[test]
	fn test_rising_cpu_is_flagged_near_end_of_horizon() {
		init_tracing();
		for model in [
			ForecastModel::LinearTrend,
			ForecastModel::HoltSmoothing,
			ForecastModel::MovingAverageTrend,
		] {
			let config = PipelineConfig::builder()
				.horizon_steps(24)
				.policy(cpu_scaling_policy(80.0))
				.forecast(ForecastConfig::builder().model(model).build())
				.build();
			let pipeline = CapacityPipeline::new(config).unwrap();
			let raw = hourly_samples(MetricName::Cpu, t0(), &linear_ramp(48, 40.0, 75.0));

			let report = pipeline.run(&raw, hours_range(48)).unwrap();
			let rec = &report.recommendation;
			assert!(rec.flagged, "{:?} did not flag a rising trend", model);

			let last_step = report.horizon.points.last().unwrap().timestamp;
			assert_eq!(rec.breaching_points.last().unwrap().timestamp, last_step);
			assert_eq!(report.view.alerts.len(), rec.breaching_points.len());
		}
	}

	#[test]
	fn test_empty_samples_fail_to_build() {
		let err = MetricSeriesBuilder::new()
			.build(&[], Duration::hours(1), hours_range(24))
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::EmptySource);
	}

	#[test]
	fn test_short_series_fails_to_forecast() {
		let forecaster = QuantileForecaster::new(ForecastConfig::builder().min_history(24).build());
		let series = MetricSeries::from_values(MetricName::Cpu, t0(), Duration::hours(1), &[50.0, 55.0, 60.0])
			.unwrap();
		let err = forecaster.forecast(&series, 24).unwrap_err();
		assert!(matches!(err, ForesightError::InsufficientHistory { required: 24, actual: 3 }));
	}

	#[test]
	fn test_every_forecast_point_is_ordered() {
		for model in [
			ForecastModel::LinearTrend,
			ForecastModel::HoltSmoothing,
			ForecastModel::MovingAverageTrend,
		] {
			for non_negative in [true, false] {
				let forecaster = QuantileForecaster::new(
					ForecastConfig::builder()
						.model(model)
						.min_band(0.0)
						.non_negative(non_negative)
						.build(),
				);
				for seed in 1..=12 {
					let values = wavy(24 + seed * 5, seed as f64 * 0.37);
					let series =
						MetricSeries::from_values(MetricName::Cpu, t0(), Duration::hours(1), &values).unwrap();
					let horizon = forecaster.forecast(&series, 36).unwrap();
					for p in &horizon.points {
						assert!(p.p10 <= p.p50 && p.p50 <= p.p90, "{:?} seed {} produced {:?}", model, seed, p);
					}
				}
			}
		}
	}

	#[test]
	fn test_built_series_resample_is_identity() {
		let raw = hourly_samples(MetricName::Disk, t0(), &wavy(72, 0.9));
		let built = MetricSeriesBuilder::new()
			.build(&raw, Duration::hours(1), hours_range(72))
			.unwrap();
		let disk = &built[&MetricName::Disk];
		assert_eq!(&disk.resample(Duration::hours(1)).unwrap(), disk);
	}

	#[test]
	fn test_export_import_round_trip_of_built_history() {
		let mut raw = hourly_samples(MetricName::Cpu, t0(), &wavy(36, 0.4));
		raw.extend(hourly_samples(MetricName::Disk, t0(), &wavy(36, 1.3)));
		raw.extend(hourly_samples(MetricName::NodeCount, t0() + Duration::hours(5), &[3.0, 4.0, 4.0]));

		let built = MetricSeriesBuilder::new()
			.build(&raw, Duration::hours(1), hours_range(36))
			.unwrap();
		let imported = read_history(&write_history(&built).unwrap()).unwrap();

		assert_eq!(imported.len(), 3);
		for (metric, series) in &built {
			let back = &imported[metric];
			assert_eq!(back.len(), series.len());
			for (a, b) in series.samples().iter().zip(back.samples()) {
				assert_eq!(a.timestamp, b.timestamp);
				assert!((a.value - b.value).abs() <= f64::EPSILON * a.value.abs().max(1.0));
			}
		}
	}

	#[test]
	fn test_forecast_export_round_trip() {
		let forecaster = QuantileForecaster::new(ForecastConfig::default());
		let series = MetricSeries::from_values(MetricName::Cpu, t0(), Duration::hours(1), &wavy(48, 0.7)).unwrap();
		let mut horizon = forecaster.forecast(&series, 24).unwrap();

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("forecast.csv");
		save_forecast(&path, &horizon).unwrap();
		let loaded = load_forecast(&path, MetricName::Cpu).unwrap();

		horizon.model = IMPORTED_MODEL.to_string();
		assert_eq!(loaded, horizon);
	}

	#[test]
	fn test_threshold_monotonicity_on_real_forecast() {
		let forecaster = QuantileForecaster::new(ForecastConfig::builder().model(ForecastModel::HoltSmoothing).build());
		let series = MetricSeries::from_values(MetricName::Cpu, t0(), Duration::hours(1), &wavy(60, 1.1)).unwrap();
		let horizon = forecaster.forecast(&series, 24).unwrap();

		let advisor = ScalingAdvisor::new();
		let thresholds: Vec<f64> = (0..=400).map(|t| 150.0 - t as f64 * 0.5).collect();
		let counts: Vec<usize> = thresholds
			.iter()
			.map(|t| advisor.evaluate(&horizon, *t).breaching_points.len())
			.collect();
		assert!(counts.windows(2).all(|w| w[1] >= w[0]));
	}

	#[test]
	fn test_node_count_policy_targets_node_series() {
		let config = PipelineConfig::builder()
			.policy(node_count_policy(10.0))
			.forecast(ForecastConfig::builder().min_band(0.5).build())
			.build();
		let pipeline = CapacityPipeline::new(config).unwrap();

		let mut raw = hourly_samples(MetricName::Cpu, t0(), &[50.0; 48]);
		raw.extend(hourly_samples(MetricName::NodeCount, t0(), &linear_ramp(48, 3.0, 9.0)));

		let report = pipeline.run(&raw, hours_range(48)).unwrap();
		assert_eq!(report.target, MetricName::NodeCount);
		assert_eq!(report.horizon.metric_name, MetricName::NodeCount);
		assert!(report.recommendation.flagged);
		assert_eq!(report.view.y_axis_label, "Nodes");
	}

	struct FixtureSource;

	#[async_trait]
	impl MetricSource for FixtureSource {
		async fn get_metric_data(&self, request: &MetricDataRequest) -> ForesightResult<MetricDataResponse> {
			let timestamps: Vec<Timestamp> = (0..48).map(|i| request.start_time + Duration::hours(i)).collect();
			Ok(MetricDataResponse {
				results: request
					.queries
					.iter()
					.map(|q| MetricDataResult {
						id: q.id.clone(),
						timestamps: timestamps.clone(),
						values: match q.id.as_str() {
							"cpu" => linear_ramp(48, 40.0, 75.0),
							"disk" => vec![62.0; 48],
							_ => vec![3.0; 48],
						},
					})
					.collect(),
			})
		}
	}

	#[test]
	fn test_source_to_export_end_to_end() {
		init_tracing();
		let request = MetricDataRequest::container_insights("my-production-cluster", hours_range(48), DEFAULT_PERIOD_SECONDS);
		let pipeline = CapacityPipeline::new(PipelineConfig::default()).unwrap();

		let report = tokio_test::block_on(pipeline.fetch_and_run(&FixtureSource, &request)).unwrap();
		assert_eq!(report.history.len(), 3);
		assert!(report.recommendation.flagged);

		let imported = read_history(&write_history(&report.history).unwrap()).unwrap();
		assert_eq!(imported, report.history);
	}

	#[test]
	fn test_config_drives_pipeline() {
		let config = PipelineConfig::from_json_str(
			r#"{ "horizon_steps": 6, "policy": { "name": "disk-scaling", "metric": "Disk", "threshold": 90.0 }, "forecast": { "min_history": 12 } }"#,
		)
		.unwrap();
		let pipeline = CapacityPipeline::new(config).unwrap();
		let raw = hourly_samples(MetricName::Disk, t0(), &[60.0; 12]);

		let report = pipeline.run(&raw, hours_range(12)).unwrap();
		assert_eq!(report.horizon.len(), 6);
		assert_eq!(report.recommendation.threshold, 90.0);
	}
}
