/// Makes every title unique across runs.
///
/// The first occurrence of a title is kept as is; the k-th repetition
/// (counting from one) becomes `"<title> (k+1)"`, so `["A", "A", "B", "A"]`
/// becomes `["A", "A (2)", "B", "A (3)"]`.
pub fn disambiguate<S: AsRef<str>>(titles: &[S]) -> Vec<String> {
    titles
        .iter()
        .enumerate()
        .map(|(index, title)| {
            let title = title.as_ref();
            let earlier = titles[..index]
                .iter()
                .filter(|candidate| candidate.as_ref() == title)
                .count();
            if earlier == 0 {
                title.to_string()
            } else {
                format!("{title} ({})", earlier + 1)
            }
        })
        .collect()
}
