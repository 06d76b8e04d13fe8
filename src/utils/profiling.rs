use std::time::{Duration, Instant};

/// Per-step timing breakdown of the solver pipeline phases.
///
/// Attached to the world and filled in by `solve_step`; query or `report()`
/// it after stepping.
#[derive(Debug, Default, Clone, Copy)]
pub struct SolverProfiler {
    pub pre_solve_time: Duration,
    pub warm_start_time: Duration,
    pub velocity_time: Duration,
    pub integrate_time: Duration,
    pub position_time: Duration,
    pub total_step_time: Duration,

    pub body_count: usize,
    pub joint_count: usize,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
}

impl SolverProfiler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn report(&self) {
        let total_us = self.total_step_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        println!("--- Solver Profile ---");
        println!(
            "Bodies: {}, Joints: {}, Iterations: {}v/{}p",
            self.body_count, self.joint_count, self.velocity_iterations, self.position_iterations
        );

        println!(
            "Total Step: {:.2} ms",
            self.total_step_time.as_secs_f32() * 1000.0
        );

        let phase = |label: &str, duration: Duration| {
            println!(
                "  {label:<12} {:.2} ms ({:.1}%)",
                duration.as_secs_f32() * 1000.0,
                (duration.as_micros() as f32 / total_us) * 100.0
            );
        };

        phase("Pre-Solve:", self.pre_solve_time);
        phase("Warm-Start:", self.warm_start_time);
        phase("Velocity:", self.velocity_time);
        phase("Integrate:", self.integrate_time);
        phase("Position:", self.position_time);
        println!("----------------------");
    }
}

/// Accumulates the elapsed time of a scope into a `Duration` slot.
pub struct PhaseTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for PhaseTimer<'a> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
