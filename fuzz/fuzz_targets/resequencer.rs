#![no_main]

use logweave::{MergeResult, Merger, Resequencer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&window, values)) = data.split_first() else {
        return;
    };
    let window = usize::from(window).max(1);
    let input: Vec<MergeResult<u8>> = values.iter().copied().map(Ok).collect();

    let resequenced: Vec<u8> = match Resequencer::new(input.into_iter(), window) {
        Ok(r) => r.map(|v| v.unwrap_or_default()).collect(),
        Err(_) => return,
    };
    assert_eq!(resequenced.len(), values.len());
    if window >= values.len() {
        assert!(resequenced.windows(2).all(|w| w[0] <= w[1]));
    }

    // splitting the sorted output in two and merging it back must be lossless
    let (left, right) = resequenced.split_at(resequenced.len() / 2);
    let mut left = left.to_vec();
    let mut right = right.to_vec();
    left.sort_unstable();
    right.sort_unstable();
    let streams = vec![
        left.into_iter().map(Ok).collect::<Vec<MergeResult<u8>>>().into_iter(),
        right.into_iter().map(Ok).collect::<Vec<MergeResult<u8>>>().into_iter(),
    ];
    let merged: Vec<u8> = Merger::new(streams)
        .map(|m| m.map(|v| v.unwrap_or_default()).collect())
        .unwrap_or_default();
    assert_eq!(merged.len(), resequenced.len());
    assert!(merged.windows(2).all(|w| w[0] <= w[1]));
});
