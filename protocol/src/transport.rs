//! 链路抽象
//!
//! 蓝牙连接由宿主负责，这里只提供按行收发命令的链路：
//! 每条命令一行，以 `\n` 结尾，`\r` 会被去掉。
//! TCP 实现用于连接外设模拟器或串口/BLE 桥接程序。

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{ProtocolError, Result};
use crate::{CONNECT_TIMEOUT, MAX_LINE_LEN};

/// 链路抽象 trait
#[async_trait]
pub trait Link: Send {
    /// 发送一行命令
    async fn send_line(&mut self, line: &str) -> Result<()>;

    /// 接收一行命令
    async fn recv_line(&mut self) -> Result<String>;

    /// 关闭链路
    async fn close(&mut self) -> Result<()>;

    /// 获取远端地址
    fn peer_addr(&self) -> Option<String>;
}

/// 连接器 trait
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Link;

    /// 建立连接
    async fn connect(&self, addr: &str) -> Result<Self::Conn>;
}

// ============================================================================
// 行编解码
// ============================================================================

/// 行读取器
pub struct LineReader<R> {
    reader: BufReader<R>,
    buffer: Vec<u8>,
    /// 超长行的剩余部分，读到换行前全部丢弃
    discarding: bool,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    /// 创建新的行读取器
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buffer: Vec::with_capacity(MAX_LINE_LEN),
            discarding: false,
        }
    }

    /// 读取下一行非空命令
    pub async fn read_line(&mut self) -> Result<String> {
        loop {
            let line = self.read_raw_line().await?;
            if !line.is_empty() {
                return Ok(line);
            }
        }
    }

    /// 读取一行，未读完的内容保留在缓冲区中，被取消后可以继续读取
    ///
    /// 超长行和非 UTF-8 行只影响这一行，之后可以继续读取。
    async fn read_raw_line(&mut self) -> Result<String> {
        loop {
            if let Some(index) = self.buffer.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=index).collect();
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if line.len() > MAX_LINE_LEN {
                    return Err(ProtocolError::LineTooLong {
                        size: line.len(),
                        max: MAX_LINE_LEN,
                    });
                }
                return String::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8);
            }

            if self.discarding {
                self.buffer.clear();
            } else if self.buffer.len() > MAX_LINE_LEN {
                let size = self.buffer.len();
                self.buffer.clear();
                self.discarding = true;
                return Err(ProtocolError::LineTooLong {
                    size,
                    max: MAX_LINE_LEN,
                });
            }

            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Err(ProtocolError::ConnectionClosed);
            }
            let consumed = available.len();
            self.buffer.extend_from_slice(available);
            self.reader.consume(consumed);
        }
    }
}

/// 行写入器
pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    /// 创建新的行写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 写入一行命令
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        if line.len() > MAX_LINE_LEN {
            return Err(ProtocolError::LineTooLong {
                size: line.len(),
                max: MAX_LINE_LEN,
            });
        }

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// 关闭写端
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// 按行收发的链路
pub struct LineLink<R, W> {
    reader: LineReader<R>,
    writer: LineWriter<W>,
    peer_addr: Option<String>,
}

impl<R, W> LineLink<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// 由读写两端创建
    pub fn new(reader: R, writer: W, peer_addr: Option<String>) -> Self {
        Self {
            reader: LineReader::new(reader),
            writer: LineWriter::new(writer),
            peer_addr,
        }
    }

    /// 分离读写端
    pub fn split(self) -> (LineReader<R>, LineWriter<W>) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl<R, W> Link for LineLink<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_line(line).await
    }

    async fn recv_line(&mut self) -> Result<String> {
        self.reader.read_line().await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 链路
pub type TcpLink = LineLink<OwnedReadHalf, OwnedWriteHalf>;

impl TcpLink {
    /// 从 TcpStream 创建
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        let (read_half, write_half) = stream.into_split();
        Ok(Self::new(read_half, write_half, peer_addr))
    }
}

/// TCP 连接器
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpLink;

    async fn connect(&self, addr: &str) -> Result<Self::Conn> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)?
            .map_err(ProtocolError::Io)?;

        TcpLink::from_stream(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_line_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(256);
        let (client_read, client_write) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server);

        let mut central = LineLink::new(client_read, client_write, None);
        let mut peripheral = LineLink::new(server_read, server_write, None);

        central.send_line("feature msg").await.unwrap();
        assert_eq!(peripheral.recv_line().await.unwrap(), "feature msg");

        peripheral.send_line("ok").await.unwrap();
        assert_eq!(central.recv_line().await.unwrap(), "ok");

        central.close().await.unwrap();
        assert!(matches!(
            peripheral.recv_line().await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_reader_strips_crlf_and_skips_blank_lines() {
        let input: &[u8] = b"ok\r\n\r\n\nmove e2e4\n";
        let mut reader = LineReader::new(input);

        assert_eq!(reader.read_line().await.unwrap(), "ok");
        assert_eq!(reader.read_line().await.unwrap(), "move e2e4");
        assert!(matches!(
            reader.read_line().await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_reader_rejects_long_line() {
        let mut input = vec![b'a'; MAX_LINE_LEN + 10];
        input.push(b'\n');
        let mut reader = LineReader::new(input.as_slice());

        assert!(matches!(
            reader.read_line().await,
            Err(ProtocolError::LineTooLong { .. })
        ));
    }

    #[tokio::test]
    async fn test_reader_recovers_after_long_line() {
        // 远超缓冲区，超限时换行还没读到
        let mut input = vec![b'x'; MAX_LINE_LEN * 20];
        input.extend_from_slice(b"\nok\n");
        let mut reader = LineReader::new(input.as_slice());

        assert!(matches!(
            reader.read_line().await,
            Err(ProtocolError::LineTooLong { .. })
        ));
        assert_eq!(reader.read_line().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_reader_rejects_invalid_utf8() {
        let input: &[u8] = b"\xff\xfe\n";
        let mut reader = LineReader::new(input);

        assert!(matches!(reader.read_line().await, Err(ProtocolError::InvalidUtf8)));
        assert!(matches!(
            reader.read_line().await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_tcp_link() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        // 外设模拟器
        let peripheral_handle = tokio::spawn(async move {
            let (stream, _addr) = listener.accept().await.unwrap();
            let mut link = TcpLink::from_stream(stream).unwrap();
            assert_eq!(link.recv_line().await.unwrap(), "feature msg");
            link.send_line("nok").await.unwrap();
        });

        let mut link = TcpConnector.connect(&addr).await.unwrap();
        assert_eq!(link.peer_addr(), Some(addr));
        link.send_line("feature msg").await.unwrap();
        assert_eq!(link.recv_line().await.unwrap(), "nok");

        peripheral_handle.await.unwrap();
    }
}
