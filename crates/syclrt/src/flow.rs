//! Task graphs of command groups.
//!
//! A [`TaskFlow`] records command-group functions and the ordering edges between them, then
//! submits them to a queue in topological order. Each submission depends explicitly on the events
//! of its predecessors, so the graph order holds even for tasks that share no buffers.

use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::queue::{Event, Handler, Queue};

type CommandGroupFn<'f> = Box<dyn Fn(&mut Handler) -> Result<()> + 'f>;

/// Handle to a task of one [`TaskFlow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

struct Task<'f> {
    name: String,
    command_group: CommandGroupFn<'f>,
    successors: Vec<usize>,
    dependents: Vec<usize>,
}

#[derive(Default)]
pub struct TaskFlow<'f> {
    tasks: Vec<Task<'f>>,
}

impl<'f> TaskFlow<'f> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Add a task running `command_group` in its own submission.
    pub fn emplace<F>(&mut self, name: impl Into<String>, command_group: F) -> TaskId
    where
        F: Fn(&mut Handler) -> Result<()> + 'f,
    {
        self.tasks.push(Task {
            name: name.into(),
            command_group: Box::new(command_group),
            successors: Vec::new(),
            dependents: Vec::new(),
        });
        TaskId(self.tasks.len() - 1)
    }

    /// `task` runs before every task of `successors`.
    pub fn precede(&mut self, task: TaskId, successors: &[TaskId]) -> &mut Self {
        for &next in successors {
            self.link(task, next);
        }
        self
    }

    /// `task` runs after every task of `predecessors`.
    pub fn succeed(&mut self, task: TaskId, predecessors: &[TaskId]) -> &mut Self {
        for &previous in predecessors {
            self.link(previous, task);
        }
        self
    }

    fn link(&mut self, from: TaskId, to: TaskId) {
        assert!(
            from.0 < self.tasks.len() && to.0 < self.tasks.len(),
            "task id does not belong to this flow"
        );
        if !self.tasks[from.0].successors.contains(&to.0) {
            self.tasks[from.0].successors.push(to.0);
            self.tasks[to.0].dependents.push(from.0);
        }
    }

    pub fn name(&self, task: TaskId) -> &str {
        &self.tasks[task.0].name
    }

    pub fn num_successors(&self, task: TaskId) -> usize {
        self.tasks[task.0].successors.len()
    }

    pub fn num_dependents(&self, task: TaskId) -> usize {
        self.tasks[task.0].dependents.len()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Kahn's algorithm; ties go to the task emplaced first.
    fn topological_order(&self) -> Result<Vec<usize>> {
        let mut indegree: Vec<usize> = self.tasks.iter().map(|task| task.dependents.len()).collect();
        let mut ready: VecDeque<usize> = (0..self.tasks.len()).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.tasks.len());

        while let Some(index) = ready.pop_front() {
            order.push(index);
            for &next in &self.tasks[index].successors {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() != self.tasks.len() {
            let stuck: Vec<&str> = (0..self.tasks.len())
                .filter(|&i| indegree[i] > 0)
                .map(|i| self.tasks[i].name.as_str())
                .collect();
            return Err(Error::invalid_parameter(format!(
                "task flow has a cycle through {}",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }

    /// Submit every task to `queue`.
    ///
    /// The flow is checked for cycles before anything is submitted. A command-group function that
    /// fails stops the run; tasks submitted before it keep running.
    pub fn run(&self, queue: &Queue) -> Result<FlowRun> {
        let order = self.topological_order()?;
        let mut events: Vec<Option<Event>> = vec![None; self.tasks.len()];

        for index in order {
            let task = &self.tasks[index];
            let dependencies: Vec<Event> = task.dependents.iter().filter_map(|&d| events[d].clone()).collect();
            let event = queue.submit(|h| {
                h.named(task.name.clone());
                h.depends_on_all(&dependencies);
                (task.command_group)(h)
            })?;
            debug!(task = %task.name, dependencies = dependencies.len(), "flow task submitted");
            events[index] = Some(event);
        }

        Ok(FlowRun {
            events: events.into_iter().flatten().collect(),
        })
    }
}

impl fmt::Debug for TaskFlow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tasks.iter().map(|task| (&task.name, &task.successors)))
            .finish()
    }
}

/// Events of one submitted [`TaskFlow`], indexed by task.
#[derive(Debug, Clone)]
pub struct FlowRun {
    events: Vec<Event>,
}

impl FlowRun {
    pub fn event(&self, task: TaskId) -> &Event {
        &self.events[task.0]
    }

    pub fn wait(&self) {
        Event::wait_all(&self.events);
    }

    /// The first recorded task failure, in task order.
    pub fn error(&self) -> Option<Error> {
        self.events.iter().find_map(Event::error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::device::host_selector;
    use crate::error::ErrorKind;

    #[test]
    fn counts_edges_once() {
        let mut flow = TaskFlow::new();
        let a = flow.emplace("a", |_h| Ok(()));
        let b = flow.emplace("b", |_h| Ok(()));
        let c = flow.emplace("c", |_h| Ok(()));
        flow.precede(a, &[b, c]).precede(a, &[b]);
        flow.succeed(c, &[b]);

        assert_eq!(flow.name(a), "a");
        assert_eq!(flow.num_successors(a), 2);
        assert_eq!(flow.num_dependents(c), 2);
        assert_eq!(flow.topological_order().expect("acyclic"), vec![0, 1, 2]);
    }

    #[test]
    fn cycles_are_rejected_before_submission() {
        let mut flow = TaskFlow::new();
        let a = flow.emplace("a", |_h| Ok(()));
        let b = flow.emplace("b", |_h| Ok(()));
        flow.precede(a, &[b]).precede(b, &[a]);
        let err = flow.topological_order().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(err.message().contains("a, b"));
    }

    #[test]
    fn tasks_run_in_graph_order() -> Result<()> {
        let queue = Queue::new(&crate::device::cpu_selector())?;
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut flow = TaskFlow::new();
        let mut ids = Vec::new();
        for name in ["load", "scale", "store"] {
            let log = Arc::clone(&log);
            ids.push(flow.emplace(name, move |h| {
                let log = Arc::clone(&log);
                h.single_task(move || log.lock().push(name))
            }));
        }
        flow.succeed(ids[2], &[ids[1]]).precede(ids[0], &[ids[1]]);

        let run = flow.run(&queue)?;
        run.wait();
        assert!(run.error().is_none());
        assert_eq!(*log.lock(), vec!["load", "scale", "store"]);
        Ok(())
    }

    #[test]
    fn tasks_are_named_after_the_flow_entry() -> Result<()> {
        let queue = Queue::new(&host_selector())?;
        let mut flow = TaskFlow::new();
        let task = flow.emplace("noop", |h| h.single_task(|| {}));
        flow.run(&queue)?.event(task).wait();
        assert_eq!(queue.kernel_stats("noop").len(), 1);
        Ok(())
    }
}
