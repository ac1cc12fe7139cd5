mod common;

use syclrt::{AccessMode, Buffer, Range, Result, TaskFlow};

#[test]
fn vector_pipeline_over_shared_buffers() -> Result<()> {
    for queue in common::queues()? {
        let mut c = vec![0i32; 10];
        {
            let a = Buffer::copy_from(&[1i32; 10]);
            let b = Buffer::copy_from(&[2i32; 10]);
            let out = Buffer::from_host(&mut c);

            let mut flow = TaskFlow::new();
            let add = flow.emplace("add", |h| {
                let (a, b, out) = (a.access(h, AccessMode::Read)?, b.access(h, AccessMode::Read)?, out.access(h, AccessMode::DiscardWrite)?);
                h.parallel_for(Range::new([10]), move |item| out.write(item, a.read(item) + b.read(item)))
            });
            let scale = flow.emplace("scale", |h| {
                let out = out.access(h, AccessMode::ReadWrite)?;
                h.parallel_for(Range::new([10]), move |item| out.update(item, |v| v * 10))
            });
            let bump = flow.emplace("bump", |h| {
                let out = out.access(h, AccessMode::ReadWrite)?;
                h.single_task(move || out.update(0, |v| v + 1))
            });
            flow.precede(add, &[scale]).succeed(bump, &[scale]);
            assert_eq!(flow.num_successors(add), 1);
            assert_eq!(flow.num_dependents(bump), 1);

            let run = flow.run(&queue)?;
            run.wait();
            assert!(run.error().is_none());
            assert!(run.event(bump).is_finished());
        }
        assert_eq!(c[0], 31);
        assert!(c[1..].iter().all(|&v| v == 30));
    }
    Ok(())
}
