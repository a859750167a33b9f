use anyhow::Result;

/// Terminal stage of a pipeline.
///
/// `consume` is called once per item in arrival order; `finish` runs exactly
/// once after the input stream ends (sentinel or close) and yields whatever the
/// sink accumulated.
pub trait Sink<I>: Send + 'static {
    type Output: Send + 'static;

    fn consume(&mut self, item: I) -> Result<()>;

    fn finish(self) -> Result<Self::Output>;
}

/// Any `FnMut(I) -> Result<()>` closure is a sink with no output.
impl<I, F> Sink<I> for F
where
    F: FnMut(I) -> Result<()> + Send + 'static,
{
    type Output = ();

    fn consume(&mut self, item: I) -> Result<()> {
        self(item)
    }

    fn finish(self) -> Result<()> {
        Ok(())
    }
}

/// Sink that keeps every item it receives, in order.
#[derive(Debug)]
pub struct Collect<I> {
    items: Vec<I>,
}

impl<I> Collect<I> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }
}

impl<I> Default for Collect<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Send + 'static> Sink<I> for Collect<I> {
    type Output = Vec<I>;

    fn consume(&mut self, item: I) -> Result<()> {
        self.items.push(item);
        Ok(())
    }

    fn finish(self) -> Result<Vec<I>> {
        Ok(self.items)
    }
}
