use crate::trace_processor::TaskTiming;

/// Tasks shorter than this never block input.
pub const BLOCKING_TIME_THRESHOLD: f64 = 50.0;

/// Blocking portion of one task inside `[start, end]`.
pub fn blocking_time_for_task(task: &TaskTiming, start: f64, end: f64) -> f64 {
    if task.duration < BLOCKING_TIME_THRESHOLD || task.end < start || task.start > end {
        return 0.0;
    }
    let clipped = task.end.min(end) - task.start.max(start);
    if clipped < BLOCKING_TIME_THRESHOLD {
        return 0.0;
    }
    clipped - BLOCKING_TIME_THRESHOLD
}

pub fn sum_of_blocking_time(tasks: &[TaskTiming], start: f64, end: f64) -> f64 {
    if end <= start {
        return 0.0;
    }
    tasks
        .iter()
        .map(|task| blocking_time_for_task(task, start, end))
        .sum()
}
