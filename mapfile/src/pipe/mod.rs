//! Small push/pull combinators the dump tool is assembled from.
//!
//! A [`Producer`] is pulled for items, a [`Pipe`] is pushed one item at a time
//! and may hold it back by returning `Ok(None)`. [`Chain`] glues either kind to
//! a following pipe.

mod split;
pub use split::{ConsumeLeft, Unzip};

pub trait Pipe {
    type Input;
    type Output;

    type Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error>;

    fn pipe<P>(self, next: P) -> Chain<Self, P>
    where
        Self: Sized,
        P: Pipe<Input = Self::Output, Error = Self::Error>,
    {
        Chain { first: self, next }
    }

    fn close(&mut self) {}
}

/// `first` followed by `next`. A pipe when `first` is a pipe, a producer of
/// results when `first` is a producer.
#[derive(Debug)]
pub struct Chain<A, B> {
    first: A,
    next: B,
}

impl<A, B> Pipe for Chain<A, B>
where
    A: Pipe,
    B: Pipe<Input = A::Output, Error = A::Error>,
{
    type Input = A::Input;
    type Output = B::Output;
    type Error = B::Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        match self.first.process(input)? {
            Some(item) => self.next.process(item),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.first.close();
        self.next.close();
    }
}

impl<A, B> Producer for Chain<A, B>
where
    A: Producer,
    B: Pipe<Input = A::Item>,
{
    type Item = Result<B::Output, B::Error>;

    /// Pulls until the pipe yields an output or an error. The pipe is closed
    /// once the producer runs dry.
    fn produce(&mut self) -> Option<Self::Item> {
        while let Some(item) = self.first.produce() {
            if let Some(result) = self.next.process(item).transpose() {
                return Some(result);
            }
        }
        self.next.close();
        None
    }
}

/// Collects a producer of results, stopping at the first error.
#[derive(Debug)]
pub struct TryCollector<P, C, E> {
    _s: std::marker::PhantomData<(P, C, E)>,
}

impl<P, C, E> TryCollector<P, C, E> {
    pub fn new() -> Self {
        Self {
            _s: std::marker::PhantomData,
        }
    }
}

impl<P, C, E> Default for TryCollector<P, C, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O, P, C, E> Pipe for TryCollector<P, C, E>
where
    P: Producer<Item = Result<O, E>>,
    C: FromIterator<O>,
{
    type Input = P;

    type Output = C;

    type Error = E;

    fn process(&mut self, mut input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        Result::<C, E>::from_iter(std::iter::from_fn(|| input.produce())).map(Some)
    }
}

/// Produces the wrapped value once.
#[derive(Debug)]
pub struct OwnedProducer<P>(Option<P>);

impl<T> Producer for OwnedProducer<T> {
    type Item = T;

    fn produce(&mut self) -> Option<Self::Item> {
        self.0.take()
    }
}

pub trait Producer {
    type Item;
    fn produce(&mut self) -> Option<Self::Item>;

    fn producer(self) -> OwnedProducer<Self>
    where
        Self: Sized,
    {
        OwnedProducer(Some(self))
    }

    fn feed<P>(self, pipe: P) -> Chain<Self, P>
    where
        Self: Sized,
        P: Pipe<Input = Self::Item>,
    {
        Chain {
            first: self,
            next: pipe,
        }
    }
}

impl<T> Producer for T
where
    T: Iterator,
{
    type Item = <T as Iterator>::Item;

    fn produce(&mut self) -> Option<Self::Item> {
        <Self as Iterator>::next(self)
    }
}
