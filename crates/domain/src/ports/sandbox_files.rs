use async_trait::async_trait;
use mesoslog_errors::MesosLogResult;

use crate::entities::ReadPage;

/// 节点沙箱文件读取接口
#[async_trait]
pub trait SandboxFileReader: Send + Sync {
    /// 从 `offset` 开始读取最多 `length` 字节
    async fn read_page(
        &self,
        host: &str,
        path: &str,
        offset: u64,
        length: usize,
    ) -> MesosLogResult<ReadPage>;

    /// 下载整个文件
    async fn download(&self, host: &str, path: &str) -> MesosLogResult<Vec<u8>>;
}
