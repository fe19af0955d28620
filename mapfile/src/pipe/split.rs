use super::Pipe;

/// Splits a list of pairs into two lists.
#[derive(Debug)]
pub struct Unzip<A, B, E>(std::marker::PhantomData<(A, B, E)>);

impl<A, B, E> Unzip<A, B, E> {
    pub fn new() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<A, B, E> Default for Unzip<A, B, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, B, E> Pipe for Unzip<A, B, E> {
    type Input = Vec<(A, B)>;

    type Output = (Vec<A>, Vec<B>);

    type Error = E;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        Ok(Some(input.into_iter().unzip()))
    }
}

/// Hands the left half to a consuming pipe and passes the right half on.
#[derive(Debug)]
pub struct ConsumeLeft<C, T> {
    consumer: C,
    _s: std::marker::PhantomData<T>,
}

impl<C, T> ConsumeLeft<C, T> {
    pub fn new(consumer: C) -> Self {
        Self {
            consumer,
            _s: std::marker::PhantomData,
        }
    }
}

impl<C, T> Pipe for ConsumeLeft<C, T>
where
    C: Pipe<Output = ()>,
{
    type Input = (C::Input, T);

    type Output = T;

    type Error = C::Error;

    fn process(&mut self, (left, right): Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        self.consumer.process(left)?;
        Ok(Some(right))
    }

    fn close(&mut self) {
        self.consumer.close()
    }
}
