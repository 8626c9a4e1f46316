mod util;

#[cfg(test)]
mod runner {
    use poolbench::{
        backend::{cpu::CpuPool, stream::StreamPool},
        device::Device,
        estimate_work,
        op::PoolMethod,
        BenchConfig, BenchError, BenchRunner, PoolParams, ShapeParams,
    };

    use super::util::{self, Fault, TrackingOp};

    fn small() -> (ShapeParams, PoolParams) {
        (ShapeParams::square(2, 3, 16), PoolParams::new(3, 1, 2, 8))
    }

    fn runner(device: Device, runs: usize, include_first_call: bool) -> BenchRunner {
        BenchRunner::new(BenchConfig {
            device,
            runs,
            include_first_call,
        })
    }

    #[test]
    fn trial_reports_label_and_estimate() {
        let (shape, params) = small();
        let result = runner(Device::Cpu, 3, true)
            .run(&shape, &params, "small")
            .unwrap();

        assert_eq!(result.label, "small");
        assert_eq!(result.estimated_work, estimate_work(&shape, &params));
        assert!(result.elapsed_ms_per_run >= 0.0);
        assert!(result.throughput >= 0.0);
    }

    #[test]
    fn throughput_is_work_per_second() {
        let (shape, params) = small();
        for device in [Device::Cpu, Device::Accelerator] {
            let result = runner(device, 5, true)
                .run(&shape, &params, "small")
                .unwrap();

            if result.elapsed_ms_per_run > 0.0 {
                util::assert_aprox_eq_rel(
                    result.throughput,
                    result.estimated_work / result.elapsed_ms_per_run * 1000.0,
                    1e-9,
                );
            }
        }
    }

    #[test]
    fn configures_average_pooling() {
        let (shape, params) = small();
        let mut op = TrackingOp::new(CpuPool::new());
        runner(Device::Cpu, 1, true)
            .run_with(&mut op, &shape, &params, "avg")
            .unwrap();

        let config = op.config.unwrap();
        assert_eq!(op.method(), Some(PoolMethod::Average));
        assert_eq!(
            (config.kernel_size, config.pad, config.stride),
            (params.kernel_size, params.pad, params.stride)
        );
    }

    #[test]
    fn first_call_is_timed_by_default() {
        let (shape, params) = small();
        let mut op = TrackingOp::new(CpuPool::new());
        runner(Device::Cpu, 10, true)
            .run_with(&mut op, &shape, &params, "timed")
            .unwrap();

        assert_eq!(op.forwards, 10);
        assert_eq!(op.synchronizes, 1);
    }

    #[test]
    fn warm_up_pass_when_first_call_excluded() {
        let (shape, params) = small();
        let mut op = TrackingOp::new(StreamPool::new().unwrap());
        runner(Device::Accelerator, 10, false)
            .run_with(&mut op, &shape, &params, "warm")
            .unwrap();

        assert_eq!(op.forwards, 11);
        assert_eq!(op.synchronizes, 2);
    }

    #[test]
    fn buffers_released_after_success() {
        let (shape, params) = small();
        let mut op = TrackingOp::new(StreamPool::new().unwrap());
        runner(Device::Accelerator, 4, true)
            .run_with(&mut op, &shape, &params, "release")
            .unwrap();

        assert!(op.tracked() > 0);
        assert_eq!(op.live_buffers(), 0);
    }

    #[test]
    fn buffers_released_after_setup_failure() {
        let (shape, params) = small();
        let mut op = TrackingOp::failing_at(CpuPool::new(), Fault::Setup);
        let result = runner(Device::Cpu, 4, true).run_with(&mut op, &shape, &params, "setup");

        assert!(matches!(result, Err(BenchError::Configuration(_))));
        assert_eq!(op.forwards, 0);
        assert_eq!(op.live_buffers(), 0);
    }

    #[test]
    fn buffers_released_after_forward_failure() {
        let (shape, params) = small();
        let mut op = TrackingOp::failing_at(StreamPool::new().unwrap(), Fault::Forward(3));
        let result = runner(Device::Accelerator, 4, true).run_with(&mut op, &shape, &params, "fwd");

        assert!(matches!(result, Err(BenchError::Device(_))));
        assert_eq!(op.forwards, 3);
        assert_eq!(op.live_buffers(), 0);
    }

    #[test]
    fn buffers_released_after_device_failure() {
        let (shape, params) = small();
        let mut op = TrackingOp::failing_at(StreamPool::new().unwrap(), Fault::Synchronize);
        let result = runner(Device::Accelerator, 4, true).run_with(&mut op, &shape, &params, "sync");

        assert!(matches!(result, Err(BenchError::Device(_))));
        assert_eq!(op.live_buffers(), 0);
    }

    #[test]
    fn failed_drain_after_forward_failure_is_logged() {
        let (shape, params) = small();
        let mut op = TrackingOp::failing_at(
            StreamPool::new().unwrap(),
            Fault::ForwardThenSynchronize(2),
        );
        let (result, logs) = util::captured_logs(|| {
            runner(Device::Accelerator, 4, true).run_with(&mut op, &shape, &params, "drain")
        });

        match result {
            Err(BenchError::Device(message)) => assert_eq!(message, "injected forward failure"),
            other => panic!("expected the forward failure, got {other:?}"),
        }
        assert!(logs.contains("drain: drain after failed trial also failed"), "{logs}");
        assert!(logs.contains("injected barrier failure"), "{logs}");
        assert_eq!(op.synchronizes, 1);
        assert_eq!(op.live_buffers(), 0);
    }

    #[test]
    fn kernel_larger_than_padded_input_is_fatal() {
        let shape = ShapeParams::square(1, 1, 3);
        let params = PoolParams::new(7, 1, 4, 1);

        for device in [Device::Cpu, Device::Accelerator] {
            let result = runner(device, 2, true).run(&shape, &params, "too big");
            assert!(matches!(result, Err(BenchError::Configuration(_))));
        }
    }

    #[test]
    fn oversized_shape_is_resource_exhaustion() {
        let shape = ShapeParams::new(usize::MAX / 4, 2, 1, 1);
        let params = PoolParams::new(1, 0, 1, 1);
        let result = runner(Device::Cpu, 1, true).run(&shape, &params, "huge");

        assert!(matches!(result, Err(BenchError::ResourceExhausted { .. })));
    }

    #[test]
    fn runners_with_different_devices_coexist() {
        let (shape, params) = small();
        let cpu = runner(Device::Cpu, 2, true);
        let accelerator = runner(Device::Accelerator, 2, true);

        let a = cpu.run(&shape, &params, "cpu").unwrap();
        let b = accelerator.run(&shape, &params, "accelerator").unwrap();

        assert_eq!(cpu.config().device, Device::Cpu);
        assert_eq!(accelerator.config().device, Device::Accelerator);
        assert_eq!(a.estimated_work, b.estimated_work);
    }
}
